//! Port for outbound HTTP requests.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::TransportError;

/// Result type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// HTTP method for read-path requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Full fetch.
    Get,
    /// Existence probe.
    Head,
}

/// What an outbound request targets. Selects timeout and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Ordinary JSON API call.
    Api,
    /// Image-bearing endpoint (CDN asset, redirect or legacy photo).
    Image,
    /// Multipart upload.
    Upload,
}

/// A read-path request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Endpoint category.
    pub kind: RequestKind,
}

impl FetchRequest {
    /// Creates a GET for an image endpoint.
    #[must_use]
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            kind: RequestKind::Image,
        }
    }

    /// Creates a GET for an API endpoint.
    #[must_use]
    pub fn api(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            kind: RequestKind::Api,
        }
    }

    /// Switches the request to HEAD.
    #[must_use]
    pub fn head(mut self) -> Self {
        self.method = Method::Head;
        self
    }

    /// Returns a copy targeting `url`.
    #[must_use]
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            method: self.method,
            url: url.into(),
            kind: self.kind,
        }
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status.
    pub status: u16,
    /// Final URL after redirects.
    pub final_url: String,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Body; empty for HEAD.
    pub bytes: Bytes,
}

/// Port for issuing a single HTTP request.
///
/// Implementations return `Ok` only for 2xx responses; any other status is
/// reported as [`TransportError::Status`].
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Sends the request once.
    async fn fetch(&self, request: &FetchRequest) -> TransportResult<FetchResponse>;
}
