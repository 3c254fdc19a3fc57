//! Domain entity definitions.

mod image;
mod load_chain;
mod raw_image;

pub use image::{Crop, Format, ImageId, ImageReference, Quality, TransformOptions};
pub use load_chain::{FallbackReason, LoadAttemptChain, LoadOutcome, Tier, TierKind};
pub use raw_image::{CompressionSettings, DEFAULT_LARGE_IMAGE_MB, RawImage};
