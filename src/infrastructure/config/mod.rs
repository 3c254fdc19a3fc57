//! Pipeline configuration.

pub mod app_config;
pub mod args;
pub mod storage;

pub use app_config::{
    ApiConfig, ENV_API_URL, ENV_CLOUD_NAME, ENV_FALLBACK_URL, FailureConfig, LoaderConfig,
    LogLevel, PipelineConfig,
};
pub use args::{CliArgs, Command, CompressionArgs, ReferenceArgs};
pub use storage::{ConfigError, StorageManager};
