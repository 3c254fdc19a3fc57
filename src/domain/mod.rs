//! Domain layer with core image-pipeline entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{ImageId, ImageReference, LoadOutcome, RawImage, TransformOptions};
pub use errors::{CompressionError, TransportError, UploadError};
pub use ports::{HttpFetcher, ImageSurface, KeyValueStore, UploadPort};
