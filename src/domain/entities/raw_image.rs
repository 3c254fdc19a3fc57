//! Raw image files handed to compression and upload.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Default threshold used by [`RawImage::exceeds_mb`] callers.
pub const DEFAULT_LARGE_IMAGE_MB: f64 = 2.0;

/// An encoded image file together with the metadata an upload needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    /// Original file name.
    pub name: String,
    /// MIME type, e.g. `image/jpeg`.
    pub content_type: String,
    /// Last modification time of the source file.
    pub modified: DateTime<Utc>,
    /// Encoded file contents.
    pub bytes: Bytes,
}

impl RawImage {
    /// Creates a new raw image.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        modified: DateTime<Utc>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            modified,
            bytes: bytes.into(),
        }
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the file has no contents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the file size in megabytes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size_mb(&self) -> f64 {
        self.bytes.len() as f64 / BYTES_PER_MB
    }

    /// Returns true if the file is larger than `threshold_mb`.
    #[must_use]
    pub fn exceeds_mb(&self, threshold_mb: f64) -> bool {
        self.size_mb() > threshold_mb
    }

    /// Replaces the contents, keeping name, type and modification time.
    #[must_use]
    pub fn with_bytes(&self, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: self.name.clone(),
            content_type: self.content_type.clone(),
            modified: self.modified,
            bytes: bytes.into(),
        }
    }
}

/// Constraints applied by the compression engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionSettings {
    /// Target upper bound on the encoded size. Best-effort only.
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: f64,
    /// Upper bound on the longer side, in pixels.
    #[serde(default = "default_max_width_or_height")]
    pub max_width_or_height: u32,
    /// Encoder quality in `0.0..=1.0`.
    #[serde(default = "default_quality")]
    pub quality: f32,
}

fn default_max_size_mb() -> f64 {
    1.0
}

fn default_max_width_or_height() -> u32 {
    1920
}

fn default_quality() -> f32 {
    0.85
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            max_size_mb: default_max_size_mb(),
            max_width_or_height: default_max_width_or_height(),
            quality: default_quality(),
        }
    }
}

impl CompressionSettings {
    /// Returns the quality as an encoder percentage in `1..=100`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn quality_percent(&self) -> u8 {
        (self.quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
    }
}
