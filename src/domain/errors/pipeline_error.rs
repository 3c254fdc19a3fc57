//! Compression, surface, store and upload error types.

use thiserror::Error;

use super::TransportError;

/// Compression failures. The engine recovers from these by returning the
/// original file, so they only appear in logs and internal results.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum CompressionError {
    #[error("failed to decode {name}: {message}")]
    Decode { name: String, message: String },

    #[error("failed to encode {name}: {message}")]
    Encode { name: String, message: String },

    #[error("unsupported image type {content_type} for {name}")]
    Unsupported { name: String, content_type: String },

    #[error("compression task for {name} panicked: {message}")]
    Task { name: String, message: String },
}

/// An image surface reported an error event for its current source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SurfaceError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to decode {url}: {message}")]
    Decode { url: String, message: String },
}

/// Persisted key-value store failures.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Upload failures, reported per file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum UploadError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("upload rejected: {message}")]
    Rejected { message: String },

    #[error("unexpected upload response: {message}")]
    InvalidResponse { message: String },

    #[error("upload cancelled")]
    Cancelled,
}

impl UploadError {
    /// Returns whether another attempt may succeed.
    ///
    /// Transport failures, rate limiting and server errors are retryable;
    /// other explicit rejections are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => {
                e.is_transient() || e.status_code().is_some_and(|s| s == 429 || s >= 500)
            }
            Self::Rejected { .. } | Self::InvalidResponse { .. } | Self::Cancelled => false,
        }
    }
}
