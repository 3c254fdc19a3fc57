//! reqwest-backed HTTP fetcher.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::domain::errors::TransportError;
use crate::domain::ports::{
    FetchRequest, FetchResponse, HttpFetcher, Method, RequestKind, TransportResult,
};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Fixed per-kind request timeouts, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTimeouts {
    /// Ordinary API calls.
    #[serde(default = "default_api_timeout")]
    pub api_secs: u64,
    /// Image endpoints.
    #[serde(default = "default_image_timeout")]
    pub image_secs: u64,
    /// Multipart uploads.
    #[serde(default = "default_upload_timeout")]
    pub upload_secs: u64,
}

const fn default_api_timeout() -> u64 {
    15
}

const fn default_image_timeout() -> u64 {
    30
}

const fn default_upload_timeout() -> u64 {
    60
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            api_secs: default_api_timeout(),
            image_secs: default_image_timeout(),
            upload_secs: default_upload_timeout(),
        }
    }
}

impl RequestTimeouts {
    /// Timeout applied to requests of `kind`.
    #[must_use]
    pub const fn for_kind(&self, kind: RequestKind) -> Duration {
        let secs = match kind {
            RequestKind::Api => self.api_secs,
            RequestKind::Image => self.image_secs,
            RequestKind::Upload => self.upload_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Single-shot fetcher over a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeouts: RequestTimeouts,
}

impl ReqwestFetcher {
    /// Creates a fetcher with its own client.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new(timeouts: RequestTimeouts) -> TransportResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::build(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, timeouts })
    }

    /// Underlying client, shared with the uploader.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Configured timeouts.
    #[must_use]
    pub const fn timeouts(&self) -> RequestTimeouts {
        self.timeouts
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, request: &FetchRequest) -> TransportResult<FetchResponse> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| TransportError::build(format!("invalid url {}: {e}", request.url)))?;

        let builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Head => self.client.head(url),
        };

        trace!(url = %request.url, method = ?request.method, kind = ?request.kind, "Sending request");

        let response = builder
            .timeout(self.timeouts.for_kind(request.kind))
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            debug!(url = %request.url, status = %status, "Request failed");
            return Err(TransportError::status(&request.url, status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let bytes = match request.method {
            Method::Get => response
                .bytes()
                .await
                .map_err(|e| TransportError::Body {
                    url: request.url.clone(),
                    message: e.to_string(),
                })?,
            Method::Head => bytes::Bytes::new(),
        };

        debug!(url = %request.url, status = status.as_u16(), size = bytes.len(), "Request succeeded");

        Ok(FetchResponse {
            status: status.as_u16(),
            final_url,
            content_type,
            bytes,
        })
    }
}
