//! Infrastructure layer with external service adapters.

/// Pipeline configuration.
pub mod config;
/// HTTP transport, retries and uploads.
pub mod http;
/// Image handling (compression, resolution, progressive loading).
pub mod image;
/// Key-value store adapters.
pub mod store;

pub use config::{CliArgs, Command, LogLevel, PipelineConfig, StorageManager};
pub use http::{
    MultipartUploader, ReqwestFetcher, RequestTimeouts, RetryPolicy, RetryingTransport,
    UploadPolicy, UploadQueue, UploadReport,
};
pub use image::{
    CompressionEngine, Endpoints, FailureMemory, HttpImageSurface, ProgressiveLoader,
    UrlResolver, probe_redirect,
};
pub use store::{JsonFileStore, MemoryStore};
