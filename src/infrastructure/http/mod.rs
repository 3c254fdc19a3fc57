//! HTTP transport: single-shot client, retry wrapper and uploads.

pub mod client;
pub mod dto;
pub mod retry;
pub mod upload;

pub use client::{ReqwestFetcher, RequestTimeouts};
pub use retry::{RetryAction, RetryPolicy, RetryingTransport};
pub use upload::{MultipartUploader, UploadPolicy, UploadQueue, UploadReport, interpret_response};
