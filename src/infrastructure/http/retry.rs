//! Bounded exponential-backoff retries for image requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::errors::TransportError;
use crate::domain::ports::{
    Clock, FetchRequest, FetchResponse, HttpFetcher, RequestKind, TransportResult,
};
use crate::infrastructure::image::{FailureMemory, with_cache_buster};

/// Retry decision for a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Try again after the backoff delay.
    Retry,
    /// Surface the error now.
    Abort,
}

/// Exponential backoff configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-indexed): `base * 2^(retry - 1)`.
    #[must_use]
    pub fn delay_before(&self, retry: u32) -> Duration {
        let factor = 1u64
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// Classifies a failed attempt of `request`.
    #[must_use]
    pub const fn classify(request: &FetchRequest, error: &TransportError) -> RetryAction {
        if matches!(request.kind, RequestKind::Image) && error.is_transient() {
            RetryAction::Retry
        } else {
            RetryAction::Abort
        }
    }
}

/// Wraps an [`HttpFetcher`], retrying transient failures of image requests.
///
/// Explicit non-2xx answers are never retried. URLs remembered in
/// [`FailureMemory`] fail fast with [`TransportError::KnownFailure`].
/// The transport reads the failure memory; recording is left to callers.
pub struct RetryingTransport {
    inner: Arc<dyn HttpFetcher>,
    failures: Arc<FailureMemory>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for RetryingTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingTransport")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RetryingTransport {
    /// Creates a retrying transport around `inner`.
    #[must_use]
    pub fn new(
        inner: Arc<dyn HttpFetcher>,
        failures: Arc<FailureMemory>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            inner,
            failures,
            clock,
            policy,
        }
    }

    /// Retry policy in use.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends `request`, retrying per the policy.
    ///
    /// # Errors
    /// Returns the terminal error of the last attempt, or `KnownFailure`
    /// without any network call.
    pub async fn send(&self, request: &FetchRequest) -> TransportResult<FetchResponse> {
        if self.failures.has_failed(&request.url) {
            debug!(url = %request.url, "Skipping request to known failed URL");
            return Err(TransportError::KnownFailure {
                url: request.url.clone(),
            });
        }

        let total_attempts = self.policy.max_attempts.max(1);
        let mut current = request.clone();
        let mut attempt = 1;

        loop {
            match self.inner.fetch(&current).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if RetryPolicy::classify(request, &e) == RetryAction::Abort
                        || attempt >= total_attempts
                    {
                        return Err(e);
                    }

                    let delay = self.policy.delay_before(attempt);
                    warn!(
                        url = %request.url,
                        attempt,
                        total_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Retryable error, retrying"
                    );
                    tokio::time::sleep(delay).await;

                    current = request.with_url(with_cache_buster(
                        &request.url,
                        self.clock.now_millis(),
                    ));
                    attempt += 1;
                }
            }
        }
    }

    /// Warms `url` with a single cache-busted GET.
    ///
    /// On failure the URL is remembered in the failure memory.
    ///
    /// # Errors
    /// Returns the fetch error.
    pub async fn preload(&self, url: &str) -> TransportResult<FetchResponse> {
        if self.failures.has_failed(url) {
            return Err(TransportError::KnownFailure {
                url: url.to_string(),
            });
        }

        let busted = with_cache_buster(url, self.clock.now_millis());
        match self.inner.fetch(&FetchRequest::image(busted)).await {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(url = %url, error = %e, "Preload failed");
                self.failures.record(url);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl HttpFetcher for RetryingTransport {
    async fn fetch(&self, request: &FetchRequest) -> TransportResult<FetchResponse> {
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::FixedClock;
    use crate::domain::ports::mocks::{ScriptedFetcher, ok_response};
    use crate::infrastructure::store::MemoryStore;
    use std::sync::atomic::{AtomicI64, Ordering};

    const CDN: &str = "https://res.cloudinary.com/demo/image/upload/v1/a.jpg";

    struct SteppingClock(AtomicI64);

    impl Clock for SteppingClock {
        fn now_millis(&self) -> i64 {
            self.0.fetch_add(1, Ordering::SeqCst)
        }
    }

    fn transport(fetcher: Arc<ScriptedFetcher>) -> (RetryingTransport, Arc<FailureMemory>) {
        let failures = Arc::new(FailureMemory::new(Arc::new(MemoryStore::new())));
        let transport = RetryingTransport::new(
            fetcher,
            failures.clone(),
            Arc::new(SteppingClock(AtomicI64::new(100))),
            RetryPolicy::default(),
        );
        (transport, failures)
    }

    #[test]
    fn test_delays_are_non_decreasing() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), Duration::from_secs(1));
        assert_eq!(policy.delay_before(2), Duration::from_secs(2));
        assert!(policy.delay_before(3) >= policy.delay_before(2));
        assert_eq!(policy.delay_before(200), Duration::from_millis(u64::MAX));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_stop_after_three_attempts() {
        let fetcher = Arc::new(ScriptedFetcher::always(Err(TransportError::timeout(CDN))));
        let (transport, failures) = transport(fetcher.clone());

        let start = tokio::time::Instant::now();
        let result = transport.send(&FetchRequest::image(CDN)).await;

        assert_eq!(result, Err(TransportError::timeout(CDN)));
        assert_eq!(fetcher.calls(), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
        assert!(failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_carry_fresh_cache_buster() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.push(Err(TransportError::connect(CDN, "reset")));
        fetcher.push(Err(TransportError::connect(CDN, "reset")));
        fetcher.push(Ok(ok_response(CDN, b"img")));
        let (transport, _) = transport(fetcher.clone());

        let response = transport.send(&FetchRequest::image(CDN)).await.unwrap();

        assert_eq!(response.bytes.as_ref(), b"img");
        assert_eq!(
            fetcher.urls(),
            vec![
                CDN.to_string(),
                format!("{CDN}?t=100"),
                format!("{CDN}?t=101"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_errors_are_terminal() {
        let fetcher = Arc::new(ScriptedFetcher::always(Err(TransportError::status(CDN, 404))));
        let (transport, _) = transport(fetcher.clone());

        let result = transport.send(&FetchRequest::image(CDN)).await;
        assert_eq!(result, Err(TransportError::status(CDN, 404)));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_requests_are_not_retried() {
        let url = "http://localhost:8080/api/products";
        let fetcher = Arc::new(ScriptedFetcher::always(Err(TransportError::timeout(url))));
        let (transport, _) = transport(fetcher.clone());

        assert!(transport.send(&FetchRequest::api(url)).await.is_err());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_known_failure_short_circuits() {
        let fetcher = Arc::new(ScriptedFetcher::always(Ok(ok_response(CDN, b""))));
        let (transport, failures) = transport(fetcher.clone());
        failures.record(CDN);

        let result = transport.send(&FetchRequest::image(CDN).head()).await;
        assert_eq!(
            result,
            Err(TransportError::KnownFailure {
                url: CDN.to_string()
            })
        );
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_preload_records_failure() {
        let fetcher = Arc::new(ScriptedFetcher::always(Err(TransportError::status(CDN, 500))));
        let failures = Arc::new(FailureMemory::new(Arc::new(MemoryStore::new())));
        let transport = RetryingTransport::new(
            fetcher.clone(),
            failures.clone(),
            Arc::new(FixedClock(7)),
            RetryPolicy::default(),
        );

        assert!(transport.preload(CDN).await.is_err());
        assert_eq!(fetcher.urls(), vec![format!("{CDN}?t=7")]);
        assert!(failures.has_failed(CDN));
    }
}
