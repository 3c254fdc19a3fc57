//! Image references and transformation options.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Identifier of a stored image on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub String);

impl ImageId {
    /// Creates a new `ImageId` from any string-like input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier carries no usable value.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ImageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ImageId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<u64> for ImageId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// Crop mode understood by the transformation CDN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Crop {
    /// Fill the requested box, cropping overflow.
    #[default]
    Fill,
    /// Fit inside the requested box.
    Fit,
    /// Scale to the requested box, ignoring aspect ratio.
    Scale,
    /// Face-aware thumbnail.
    Thumb,
    /// Fit and pad to the requested box.
    Pad,
    /// Shrink only, never enlarge.
    Limit,
}

impl Crop {
    /// Returns the CDN token for this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fill => "fill",
            Self::Fit => "fit",
            Self::Scale => "scale",
            Self::Thumb => "thumb",
            Self::Pad => "pad",
            Self::Limit => "limit",
        }
    }
}

/// Output format requested from the CDN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Let the provider negotiate (default).
    #[default]
    Auto,
    /// WebP.
    Webp,
    /// JPEG.
    Jpg,
    /// PNG.
    Png,
    /// AVIF.
    Avif,
}

impl Format {
    /// Returns the CDN token for this format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Webp => "webp",
            Self::Jpg => "jpg",
            Self::Png => "png",
            Self::Avif => "avif",
        }
    }
}

/// Quality requested from the CDN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    /// Provider-chosen quality (default).
    #[default]
    Auto,
    /// Explicit level, clamped to `1..=100`.
    Level(u8),
}

impl Quality {
    /// Creates an explicit quality level, clamped to the valid range.
    #[must_use]
    pub fn level(value: u8) -> Self {
        Self::Level(value.clamp(1, 100))
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Level(q) => write!(f, "{q}"),
        }
    }
}

/// Requested shape and quality of a delivered image.
///
/// Every field is optional; unset fields fall back to provider defaults when a
/// transformation is built (`format` → `auto`, `quality` → `auto`, `crop` →
/// `fill` whenever a dimension is requested).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOptions {
    /// Target width in pixels.
    pub width: Option<NonZeroU32>,
    /// Target height in pixels.
    pub height: Option<NonZeroU32>,
    /// Crop mode.
    pub crop: Option<Crop>,
    /// Delivery quality.
    pub quality: Option<Quality>,
    /// Delivery format.
    pub format: Option<Format>,
}

impl TransformOptions {
    /// Returns true if no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width.is_none()
            && self.height.is_none()
            && self.crop.is_none()
            && self.quality.is_none()
            && self.format.is_none()
    }

    /// Sets both dimensions. Zero values are ignored.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = NonZeroU32::new(width);
        self.height = NonZeroU32::new(height);
        self
    }

    /// Sets the width. Zero is ignored.
    #[must_use]
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = NonZeroU32::new(width);
        self
    }

    /// Sets the crop mode.
    #[must_use]
    pub const fn with_crop(mut self, crop: Crop) -> Self {
        self.crop = Some(crop);
        self
    }

    /// Sets the quality.
    #[must_use]
    pub const fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Sets the format.
    #[must_use]
    pub const fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }
}

/// Abstract description of an image to display.
///
/// Built once per display request and discarded after resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageReference {
    id: Option<ImageId>,
    url: Option<String>,
    options: TransformOptions,
}

impl ImageReference {
    /// References a stored image by identifier.
    #[must_use]
    pub fn from_id(id: impl Into<ImageId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// References an image by direct URL or legacy path.
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Builds a reference from optional parts, as received from callers.
    #[must_use]
    pub fn new(id: Option<ImageId>, url: Option<String>) -> Self {
        Self {
            id,
            url,
            options: TransformOptions::default(),
        }
    }

    /// Attaches transformation options.
    #[must_use]
    pub const fn with_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the identifier, if present and non-blank.
    #[must_use]
    pub fn id(&self) -> Option<&ImageId> {
        self.id.as_ref().filter(|id| !id.is_blank())
    }

    /// Returns the URL, if present and non-blank.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    /// Returns the transformation options.
    #[must_use]
    pub const fn options(&self) -> &TransformOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_parts_are_absent() {
        let reference = ImageReference::new(Some(ImageId::new("  ")), Some(String::new()));
        assert!(reference.id().is_none());
        assert!(reference.url().is_none());
    }

    #[test]
    fn test_numeric_id_conversion() {
        let reference = ImageReference::from_id(42u64);
        assert_eq!(reference.id().map(ImageId::as_str), Some("42"));
    }

    #[test]
    fn test_zero_dimensions_are_ignored() {
        let options = TransformOptions::default().with_size(0, 300);
        assert!(options.width.is_none());
        assert_eq!(options.height.map(NonZeroU32::get), Some(300));
        assert!(!options.is_empty());
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(Quality::level(0), Quality::Level(1));
        assert_eq!(Quality::level(250), Quality::Level(100));
        assert_eq!(Quality::Auto.to_string(), "auto");
    }
}
