//! Network transport error types.

use thiserror::Error;

/// Outbound request failures.
///
/// Transport-level variants (`Timeout`, `Connect`, `Body`) are the only ones
/// eligible for retry. `Status` is an explicit server answer and is terminal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum TransportError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("failed to read response body from {url}: {message}")]
    Body { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("{url} is known to fail, skipping request")]
    KnownFailure { url: String },

    #[error("invalid request: {message}")]
    Build { message: String },
}

impl TransportError {
    /// Creates timeout error.
    #[must_use]
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates connect error.
    #[must_use]
    pub fn connect(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates status error.
    #[must_use]
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    /// Creates request build error.
    #[must_use]
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }

    /// Returns whether the failure happened below the HTTP layer.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Connect { .. } | Self::Body { .. }
        )
    }

    /// Returns the HTTP status for explicit server responses.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let url = e.url().map(ToString::to_string).unwrap_or_default();
        if e.is_timeout() {
            Self::Timeout { url }
        } else if e.is_connect() {
            Self::Connect {
                url,
                message: e.to_string(),
            }
        } else if let Some(status) = e.status() {
            Self::Status {
                url,
                status: status.as_u16(),
            }
        } else if e.is_body() || e.is_decode() {
            Self::Body {
                url,
                message: e.to_string(),
            }
        } else if e.is_builder() {
            Self::Build {
                message: e.to_string(),
            }
        } else {
            Self::Connect {
                url,
                message: e.to_string(),
            }
        }
    }
}
