//! Progressive image loading orchestrator.
//!
//! Drives an [`ImageSurface`] through a tiered chain: tiny blurred, low
//! quality, then full quality. Falls back to the static placeholder once
//! every tier has failed.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::domain::entities::{FallbackReason, ImageReference, LoadAttemptChain, LoadOutcome, TierKind};
use crate::domain::errors::SurfaceError;
use crate::domain::ports::ImageSurface;

use super::failure_memory::FailureMemory;
use super::resolver::{Resolution, UrlResolver};

#[derive(Debug)]
enum State {
    Start,
    AttemptTier(usize),
    Fallback(FallbackReason),
    Done,
}

/// Loads images progressively onto a surface.
///
/// Tiers run strictly one after another. The only side effects are surface
/// assignments and, on exhaustion, one failure memory record.
pub struct ProgressiveLoader {
    resolver: Arc<UrlResolver>,
}

impl std::fmt::Debug for ProgressiveLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressiveLoader")
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl ProgressiveLoader {
    /// Creates a loader resolving through `resolver`.
    #[must_use]
    pub const fn new(resolver: Arc<UrlResolver>) -> Self {
        Self { resolver }
    }

    fn failures(&self) -> &FailureMemory {
        self.resolver.failures()
    }

    fn fallback_url(&self) -> &str {
        self.resolver.endpoints().fallback_url()
    }

    /// Resolves `reference` and loads it onto `surface`.
    ///
    /// Never fails: exhaustion is reported as [`LoadOutcome::Placeholder`].
    pub async fn load(
        &self,
        reference: &ImageReference,
        surface: &dyn ImageSurface,
        cancel: Option<&CancellationToken>,
    ) -> LoadOutcome {
        match self.resolver.resolve_detailed(reference) {
            Resolution::Url(url) => self.load_resolved(&url, surface, cancel).await,
            Resolution::Placeholder(reason) => self.fall_back(None, reason, surface),
        }
    }

    /// Loads an already resolved `source_url` onto `surface`.
    pub async fn load_resolved(
        &self,
        source_url: &str,
        surface: &dyn ImageSurface,
        cancel: Option<&CancellationToken>,
    ) -> LoadOutcome {
        let never = CancellationToken::new();
        let cancel = cancel.unwrap_or(&never);

        let mut chain: Option<LoadAttemptChain> = None;
        let mut attempted: Vec<TierKind> = Vec::new();
        let mut last_error: Option<SurfaceError> = None;
        let mut state = State::Start;

        loop {
            if cancel.is_cancelled() {
                debug!(url = %source_url, "Progressive load cancelled");
                return LoadOutcome::Cancelled;
            }

            trace!(url = %source_url, state = ?state, "Progressive load step");
            state = match state {
                State::Start => {
                    if self.failures().has_failed(source_url) {
                        State::Fallback(FallbackReason::KnownFailure)
                    } else {
                        let built = self.resolver.chain_for(source_url);
                        debug!(url = %source_url, tiers = built.len(), "Starting progressive load");
                        chain = Some(built);
                        State::AttemptTier(0)
                    }
                }
                State::AttemptTier(index) => {
                    let Some(tier) = chain.as_ref().and_then(|c| c.tiers().get(index)).cloned()
                    else {
                        break;
                    };
                    let is_last = chain.as_ref().is_some_and(|c| index + 1 == c.len());

                    if !sleep_or_cancel(tier.delay, cancel).await {
                        return LoadOutcome::Cancelled;
                    }

                    let result = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return LoadOutcome::Cancelled,
                        result = surface.load(&tier.url) => result,
                    };
                    attempted.push(tier.kind);

                    match result {
                        Ok(()) => {
                            debug!(url = %tier.url, tier = %tier.kind, "Tier loaded");
                            if is_last {
                                State::Done
                            } else {
                                State::AttemptTier(index + 1)
                            }
                        }
                        Err(e) => {
                            debug!(url = %tier.url, tier = %tier.kind, error = %e, "Tier failed");
                            let reason = FallbackReason::ChainExhausted {
                                last_error: e.to_string(),
                            };
                            last_error = Some(e);
                            if is_last {
                                State::Fallback(reason)
                            } else {
                                State::AttemptTier(index + 1)
                            }
                        }
                    }
                }
                State::Fallback(reason) => {
                    if matches!(reason, FallbackReason::ChainExhausted { .. }) {
                        self.failures().record(source_url);
                    }
                    if let Some(e) = &last_error {
                        warn!(url = %source_url, error = %e, "All loading attempts failed");
                    }
                    return self.fall_back(Some(source_url), reason, surface);
                }
                State::Done => {
                    info!(url = %source_url, tiers = attempted.len(), "Image loaded at full quality");
                    return LoadOutcome::Loaded {
                        url: source_url.to_string(),
                        attempted,
                    };
                }
            };
        }

        // Chains always end in a full tier, so the loop only exits through
        // Done or Fallback.
        self.fall_back(Some(source_url), FallbackReason::Unresolvable, surface)
    }

    fn fall_back(
        &self,
        source_url: Option<&str>,
        reason: FallbackReason,
        surface: &dyn ImageSurface,
    ) -> LoadOutcome {
        let placeholder = self.fallback_url().to_string();
        warn!(url = source_url.unwrap_or_default(), reason = %reason, "Showing placeholder");
        surface.show_placeholder(&placeholder);
        LoadOutcome::Placeholder {
            url: placeholder,
            reason,
        }
    }
}

/// Sleeps for `delay` unless cancelled first. Returns false on cancellation.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return true;
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ImageId, TransformOptions};
    use crate::domain::ports::FixedClock;
    use crate::domain::ports::mocks::ScriptedSurface;
    use crate::infrastructure::image::resolver::Endpoints;
    use crate::infrastructure::store::MemoryStore;

    const ASSET: &str = "https://res.cloudinary.com/demo/image/upload/v1/products/rice.jpg";
    const TS: i64 = 1_700_000_000_000;

    fn loader(cloud: Option<&str>) -> (ProgressiveLoader, Arc<FailureMemory>) {
        let failures = Arc::new(FailureMemory::new(Arc::new(MemoryStore::new())));
        let resolver = UrlResolver::new(
            Endpoints::new("http://localhost:8080/api", "/dummy.png", cloud.map(String::from)),
            failures.clone(),
            Arc::new(FixedClock(TS)),
        );
        (ProgressiveLoader::new(Arc::new(resolver)), failures)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cdn_chain_sharpens_in_order() {
        let (loader, failures) = loader(Some("demo"));
        let surface = ScriptedSurface::succeeding();

        let start = tokio::time::Instant::now();
        let outcome = loader
            .load(&ImageReference::from_url(ASSET), &surface, None)
            .await;

        assert_eq!(
            outcome,
            LoadOutcome::Loaded {
                url: ASSET.to_string(),
                attempted: vec![TierKind::Tiny, TierKind::Low, TierKind::Full],
            }
        );
        let assigned = surface.assigned();
        assert_eq!(assigned.len(), 3);
        assert!(assigned[0].contains("/upload/w_10,q_10,e_blur:1000/"));
        assert!(assigned[1].contains("/upload/w_100,q_30/"));
        assert_eq!(assigned[2], format!("{ASSET}?t={TS}"));
        assert!(start.elapsed() >= Duration::from_millis(400));
        assert!(failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tiers_advance_to_full() {
        let (loader, _) = loader(Some("demo"));
        let surface = ScriptedSurface::scripted(&[false, false, true]);

        let outcome = loader
            .load(&ImageReference::from_url(ASSET), &surface, None)
            .await;

        assert!(outcome.is_loaded());
        assert_eq!(surface.placeholder(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_chain_records_and_falls_back() {
        let (loader, failures) = loader(Some("demo"));
        let surface = ScriptedSurface::failing();

        let outcome = loader
            .load(&ImageReference::from_url(ASSET), &surface, None)
            .await;

        assert!(matches!(
            outcome,
            LoadOutcome::Placeholder {
                ref url,
                reason: FallbackReason::ChainExhausted { .. },
            } if url == "/dummy.png"
        ));
        assert_eq!(surface.assigned().len(), 4);
        assert_eq!(surface.source().as_deref(), Some("/dummy.png"));
        assert!(failures.has_failed(ASSET));
    }

    #[tokio::test]
    async fn test_known_failure_goes_straight_to_placeholder() {
        let (loader, failures) = loader(Some("demo"));
        failures.record(ASSET);
        let surface = ScriptedSurface::succeeding();

        let outcome = loader.load_resolved(ASSET, &surface, None).await;

        assert_eq!(
            outcome,
            LoadOutcome::Placeholder {
                url: "/dummy.png".to_string(),
                reason: FallbackReason::KnownFailure,
            }
        );
        assert_eq!(surface.assigned(), vec!["/dummy.png".to_string()]);
    }

    #[tokio::test]
    async fn test_legacy_endpoint_loads_single_tier() {
        let (loader, failures) = loader(None);
        let surface = ScriptedSurface::failing();

        let outcome = loader
            .load(&ImageReference::from_id(ImageId::new("5")), &surface, None)
            .await;

        assert!(outcome.is_placeholder());
        assert_eq!(
            surface.assigned(),
            vec![
                format!("http://localhost:8080/api/photos/5?t={TS}"),
                "/dummy.png".to_string(),
            ]
        );
        assert!(failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cdn_asset_loads_single_tier_when_backing_disabled() {
        let (loader, failures) = loader(None);
        let surface = ScriptedSurface::succeeding();
        let reference = ImageReference::from_url(ASSET)
            .with_options(TransformOptions::default().with_width(300));

        let outcome = loader.load(&reference, &surface, None).await;

        assert_eq!(
            outcome,
            LoadOutcome::Loaded {
                url: ASSET.to_string(),
                attempted: vec![TierKind::Full],
            }
        );
        assert_eq!(surface.assigned(), vec![format!("{ASSET}?t={TS}")]);
        assert!(failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_redirect_degrades_on_next_load() {
        let (loader, failures) = loader(Some("demo"));
        let reference = ImageReference::from_id(42u64);

        let first = ScriptedSurface::failing();
        assert!(loader.load(&reference, &first, None).await.is_placeholder());
        assert!(failures.has_failed("http://localhost:8080/api/cloudinary/redirect/42"));

        let second = ScriptedSurface::succeeding();
        let outcome = loader.load(&reference, &second, None).await;
        assert_eq!(
            outcome,
            LoadOutcome::Loaded {
                url: "http://localhost:8080/api/photos/42".to_string(),
                attempted: vec![TierKind::Full],
            }
        );
    }

    #[tokio::test]
    async fn test_unresolvable_reference_shows_placeholder() {
        let (loader, _) = loader(Some("demo"));
        let surface = ScriptedSurface::succeeding();

        let outcome = loader.load(&ImageReference::default(), &surface, None).await;
        assert_eq!(
            outcome,
            LoadOutcome::Placeholder {
                url: "/dummy.png".to_string(),
                reason: FallbackReason::Unresolvable,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_chain_has_no_side_effects() {
        let (loader, failures) = loader(Some("demo"));
        let surface = ScriptedSurface::failing();
        let token = CancellationToken::new();
        token.cancel();

        let reference = ImageReference::from_url(ASSET)
            .with_options(TransformOptions::default().with_width(300));
        let outcome = loader.load(&reference, &surface, Some(&token)).await;

        assert_eq!(outcome, LoadOutcome::Cancelled);
        assert!(surface.assigned().is_empty());
        assert!(failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_tier_delay() {
        let (loader, failures) = loader(Some("demo"));
        let surface = ScriptedSurface::failing();
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let outcome = loader.load_resolved(ASSET, &surface, Some(&token)).await;

        assert_eq!(outcome, LoadOutcome::Cancelled);
        assert_eq!(surface.assigned().len(), 1);
        assert!(failures.is_empty());
    }
}
