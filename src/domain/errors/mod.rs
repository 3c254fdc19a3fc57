//! Domain error types.

mod pipeline_error;
mod transport_error;

pub use pipeline_error::{CompressionError, StoreError, SurfaceError, UploadError};
pub use transport_error::TransportError;
