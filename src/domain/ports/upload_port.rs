//! Port for the image upload endpoint.

use async_trait::async_trait;

use crate::domain::entities::{ImageId, RawImage};
use crate::domain::errors::UploadError;

/// Port for sending one file to the upload endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UploadPort: Send + Sync {
    /// Uploads `file` and returns the identifiers the endpoint created.
    async fn upload(&self, file: &RawImage) -> Result<Vec<ImageId>, UploadError>;
}
