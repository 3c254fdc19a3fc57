//! Client-side image compression before upload.

use std::io::Cursor;

use futures_util::future::join_all;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, warn};

use crate::domain::entities::{CompressionSettings, RawImage};
use crate::domain::errors::CompressionError;

/// Computes aspect-preserving dimensions whose longer side is at most `max`.
///
/// Landscape images are bounded by width, everything else by height.
/// Images already within bounds keep their size.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn target_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    let scale = |side: u32, longer: u32| -> u32 {
        let scaled = (f64::from(side) * f64::from(max) / f64::from(longer)).round() as u32;
        scaled.max(1)
    };

    if width > height && width > max {
        (max, scale(height, width))
    } else if height > max {
        (scale(width, height), max)
    } else {
        (width, height)
    }
}

/// Downscales and re-encodes images, one pass per file.
///
/// Failures never reach the caller: a file that cannot be decoded or
/// encoded comes back unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressionEngine {
    settings: CompressionSettings,
}

impl CompressionEngine {
    /// Creates an engine applying `settings`.
    #[must_use]
    pub const fn new(settings: CompressionSettings) -> Self {
        Self { settings }
    }

    /// Settings applied to every file.
    #[must_use]
    pub const fn settings(&self) -> &CompressionSettings {
        &self.settings
    }

    /// Compresses one file, returning the original on failure.
    #[must_use]
    pub fn compress(&self, file: &RawImage) -> RawImage {
        match self.try_compress(file) {
            Ok(compressed) => {
                if compressed.exceeds_mb(self.settings.max_size_mb) {
                    warn!(
                        name = %compressed.name,
                        size_mb = compressed.size_mb(),
                        max_size_mb = self.settings.max_size_mb,
                        "Compressed image still exceeds target size"
                    );
                }
                compressed
            }
            Err(e) => {
                warn!(error = %e, "Compression failed, keeping original");
                file.clone()
            }
        }
    }

    /// Compresses every file concurrently on the blocking pool.
    ///
    /// Output order matches input order and the batch never fails.
    pub async fn compress_all(&self, files: Vec<RawImage>) -> Vec<RawImage> {
        let tasks = files.into_iter().map(|file| {
            let engine = *self;
            async move {
                let original = file.clone();
                match tokio::task::spawn_blocking(move || engine.compress(&file)).await {
                    Ok(compressed) => compressed,
                    Err(e) => {
                        let error = CompressionError::Task {
                            name: original.name.clone(),
                            message: e.to_string(),
                        };
                        warn!(error = %error, "Compression task failed, keeping original");
                        original
                    }
                }
            }
        });

        join_all(tasks).await
    }

    /// Compresses one file, reporting why it could not be.
    ///
    /// # Errors
    /// Returns an error if the format is unsupported or the file cannot be
    /// decoded or encoded.
    pub fn try_compress(&self, file: &RawImage) -> Result<RawImage, CompressionError> {
        let format = detect_format(file)?;

        let decoded = image::load_from_memory_with_format(&file.bytes, format).map_err(|e| {
            CompressionError::Decode {
                name: file.name.clone(),
                message: e.to_string(),
            }
        })?;

        let (width, height) = (decoded.width(), decoded.height());
        let (target_w, target_h) =
            target_dimensions(width, height, self.settings.max_width_or_height);

        let resized = if (target_w, target_h) == (width, height) {
            decoded
        } else {
            decoded.resize_exact(target_w, target_h, FilterType::Lanczos3)
        };

        let encoded = self.encode(&resized, format).map_err(|e| CompressionError::Encode {
            name: file.name.clone(),
            message: e.to_string(),
        })?;

        debug!(
            name = %file.name,
            from = %format!("{width}x{height}"),
            to = %format!("{target_w}x{target_h}"),
            before = file.len(),
            after = encoded.len(),
            "Compressed image"
        );

        Ok(file.with_bytes(encoded))
    }

    fn encode(&self, image: &DynamicImage, format: ImageFormat) -> image::ImageResult<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        match format {
            ImageFormat::Jpeg => {
                let encoder =
                    JpegEncoder::new_with_quality(&mut out, self.settings.quality_percent());
                DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
            }
            ImageFormat::WebP => {
                DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut out, format)?;
            }
            _ => image.write_to(&mut out, format)?,
        }
        Ok(out.into_inner())
    }
}

fn detect_format(file: &RawImage) -> Result<ImageFormat, CompressionError> {
    let format = ImageFormat::from_mime_type(&file.content_type)
        .or_else(|| image::guess_format(&file.bytes).ok());

    match format {
        Some(format @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP)) => Ok(format),
        _ => Err(CompressionError::Unsupported {
            name: file.name.clone(),
            content_type: file.content_type.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use image::{Rgb, RgbImage};
    use test_case::test_case;

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, format)
            .unwrap();
        out.into_inner()
    }

    fn settings(max: u32) -> CompressionSettings {
        CompressionSettings {
            max_width_or_height: max,
            ..CompressionSettings::default()
        }
    }

    #[test_case(5000, 5000, 600, (600, 600) ; "square_bounded_by_height")]
    #[test_case(4000, 2000, 1920, (1920, 960) ; "landscape")]
    #[test_case(1000, 3000, 1920, (640, 1920) ; "portrait")]
    #[test_case(800, 600, 1920, (800, 600) ; "within_bounds")]
    #[test_case(3, 2000, 100, (1, 100) ; "never_zero")]
    fn test_target_dimensions(w: u32, h: u32, max: u32, expected: (u32, u32)) {
        let (tw, th) = target_dimensions(w, h, max);
        assert_eq!((tw, th), expected);
        assert!(tw.max(th) <= max);
    }

    #[test]
    fn test_png_is_downscaled() {
        let file = RawImage::new(
            "wide.png",
            "image/png",
            Utc::now(),
            encoded(800, 400, ImageFormat::Png),
        );
        let engine = CompressionEngine::new(settings(200));

        let out = engine.compress(&file);
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 100));
        assert_eq!(out.name, file.name);
        assert_eq!(out.content_type, file.content_type);
        assert_eq!(out.modified, file.modified);
    }

    #[test]
    fn test_large_square_is_bounded_end_to_end() {
        let img = RgbImage::from_pixel(5000, 5000, Rgb([120, 180, 60]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        let file = RawImage::new("big.png", "image/png", Utc::now(), out.into_inner());

        let compressed = CompressionEngine::new(settings(600)).compress(&file);

        let decoded = image::load_from_memory(&compressed.bytes).unwrap();
        assert_eq!(decoded.width().max(decoded.height()), 600);
        assert_eq!((decoded.width(), decoded.height()), (600, 600));
    }

    #[test]
    fn test_jpeg_honours_quality() {
        let bytes = encoded(300, 300, ImageFormat::Png);
        let source = image::load_from_memory(&bytes).unwrap();
        let mut jpeg = Cursor::new(Vec::new());
        source.write_to(&mut jpeg, ImageFormat::Jpeg).unwrap();
        let file = RawImage::new("photo.jpg", "image/jpeg", Utc::now(), jpeg.into_inner());

        let low = CompressionEngine::new(CompressionSettings {
            quality: 0.1,
            ..settings(1920)
        })
        .compress(&file);
        let high = CompressionEngine::new(CompressionSettings {
            quality: 1.0,
            ..settings(1920)
        })
        .compress(&file);

        assert!(low.len() < high.len());
        assert_eq!(image::guess_format(&low.bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_corrupt_file_is_returned_unchanged() {
        let file = RawImage::new("broken.jpg", "image/jpeg", Utc::now(), vec![0xFF, 0xD8, 0x00]);
        let out = CompressionEngine::default().compress(&file);
        assert_eq!(out, file);
    }

    #[test]
    fn test_unsupported_type_is_error() {
        let file = RawImage::new("notes.txt", "text/plain", Utc::now(), b"hello".to_vec());
        let engine = CompressionEngine::default();
        assert!(matches!(
            engine.try_compress(&file),
            Err(CompressionError::Unsupported { .. })
        ));
        assert_eq!(engine.compress(&file), file);
    }

    #[tokio::test]
    async fn test_batch_survives_corrupt_file() {
        let good = RawImage::new(
            "good.png",
            "image/png",
            Utc::now(),
            encoded(400, 100, ImageFormat::Png),
        );
        let bad = RawImage::new("bad.png", "image/png", Utc::now(), vec![1, 2, 3, 4]);
        let engine = CompressionEngine::new(settings(100));

        let out = engine.compress_all(vec![good.clone(), bad.clone()]).await;

        assert_eq!(out.len(), 2);
        let decoded = image::load_from_memory(&out[0].bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 25));
        assert_eq!(out[1], bad);
    }
}
