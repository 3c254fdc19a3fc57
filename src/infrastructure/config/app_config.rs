//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::args::CliArgs;
use super::storage::ConfigError;
use crate::domain::entities::CompressionSettings;
use crate::infrastructure::http::{RequestTimeouts, RetryPolicy, UploadPolicy};
use crate::infrastructure::image::TierDelays;

const APP_NAME: &str = "imgpipe";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";

/// Environment variable overriding the API base URL.
pub const ENV_API_URL: &str = "IMGPIPE_API_URL";
/// Environment variable overriding the placeholder path.
pub const ENV_FALLBACK_URL: &str = "IMGPIPE_FALLBACK_URL";
/// Environment variable holding the CDN cloud name.
pub const ENV_CLOUD_NAME: &str = "IMGPIPE_CLOUD_NAME";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Backend endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base API origin, e.g. `http://localhost:8080/api`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Static placeholder shown when nothing else loads.
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,

    /// CDN cloud name. Presence enables transformation endpoints.
    #[serde(default)]
    pub cloud_name: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_fallback_url() -> String {
    "/dummy.png".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            fallback_url: default_fallback_url(),
            cloud_name: None,
        }
    }
}

/// Progressive loading delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Pause before the low quality tier, in milliseconds.
    #[serde(default = "default_low_tier_delay_ms")]
    pub low_tier_delay_ms: u64,

    /// Pause before the full quality tier, in milliseconds.
    #[serde(default = "default_full_tier_delay_ms")]
    pub full_tier_delay_ms: u64,
}

const fn default_low_tier_delay_ms() -> u64 {
    100
}

const fn default_full_tier_delay_ms() -> u64 {
    300
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            low_tier_delay_ms: default_low_tier_delay_ms(),
            full_tier_delay_ms: default_full_tier_delay_ms(),
        }
    }
}

impl LoaderConfig {
    /// Converts to resolver tier delays.
    #[must_use]
    pub const fn tier_delays(&self) -> TierDelays {
        TierDelays {
            low: Duration::from_millis(self.low_tier_delay_ms),
            full: Duration::from_millis(self.full_tier_delay_ms),
        }
    }
}

/// Failure memory settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureConfig {
    /// Maximum remembered URLs.
    #[serde(default = "default_failure_capacity")]
    pub capacity: usize,

    /// Store file. Defaults to the data directory.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

const fn default_failure_capacity() -> usize {
    crate::infrastructure::image::failure_memory::DEFAULT_CAPACITY
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            capacity: default_failure_capacity(),
            store_path: None,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Log file path.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Backend endpoints.
    #[serde(default)]
    pub api: ApiConfig,

    /// Request timeouts per endpoint kind.
    #[serde(default)]
    pub timeouts: RequestTimeouts,

    /// Image request retry policy.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Compression before upload.
    #[serde(default)]
    pub compression: CompressionSettings,

    /// Progressive loading.
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Batch upload pacing.
    #[serde(default)]
    pub upload: UploadPolicy,

    /// Failure memory.
    #[serde(default)]
    pub failures: FailureConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            log_level: LogLevel::Info,
            api: ApiConfig::default(),
            timeouts: RequestTimeouts::default(),
            retry: RetryPolicy::default(),
            compression: CompressionSettings::default(),
            loader: LoaderConfig::default(),
            upload: UploadPolicy::default(),
            failures: FailureConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`. Blank values are ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base_url) = get(ENV_API_URL) {
            self.api.base_url = base_url;
        }
        if let Some(fallback_url) = get(ENV_FALLBACK_URL) {
            self.api.fallback_url = fallback_url;
        }
        if let Some(cloud_name) = get(ENV_CLOUD_NAME) {
            self.api.cloud_name = Some(cloud_name);
        }
    }

    /// Checks values that would make a component misbehave.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compression.max_width_or_height == 0 {
            return Err(ConfigError::Invalid {
                field: "compression.max_width_or_height",
                reason: "must be positive",
            });
        }
        if self.failures.capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "failures.capacity",
                reason: "must be positive",
            });
        }
        Ok(())
    }

    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(api_url) = &args.api_url {
            self.api.base_url.clone_from(api_url);
        }
        if let Some(fallback_url) = &args.fallback_url {
            self.api.fallback_url.clone_from(fallback_url);
        }
        if let Some(cloud_name) = &args.cloud_name {
            self.api.cloud_name = Some(cloud_name.clone());
        }
        if args.no_cdn {
            self.api.cloud_name = None;
        }
    }

    /// Returns default failure store path.
    #[must_use]
    pub fn default_store_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("failures.json"))
    }

    /// Returns effective failure store path.
    #[must_use]
    pub fn effective_store_path(&self) -> Option<PathBuf> {
        self.failures
            .store_path
            .clone()
            .or_else(Self::default_store_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
            log_level = "debug"

            [api]
            base_url = "https://shop.example.com/api"
            cloud_name = "demo"

            [retry]
            max_attempts = 5

            [compression]
            quality = 0.7
        "#;

        let config: PipelineConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.api.base_url, "https://shop.example.com/api");
        assert_eq!(config.api.fallback_url, "/dummy.png");
        assert_eq!(config.api.cloud_name.as_deref(), Some("demo"));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert!((config.compression.quality - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.compression.max_width_or_height, 1920);
        assert_eq!(config.timeouts, RequestTimeouts::default());
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();

        assert_eq!(config.api.cloud_name, None);
        assert_eq!(config.failures.capacity, 100);
        assert_eq!(config.upload.inter_item_delay_ms, 1000);
        assert_eq!(config.loader.tier_delays(), TierDelays::default());
    }

    #[test]
    fn test_env_overrides_ignore_blank_values() {
        let mut config = PipelineConfig::default();
        config.apply_env_from(|key| match key {
            ENV_API_URL => Some("https://api.example.com".to_string()),
            ENV_CLOUD_NAME => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.api.cloud_name, None);
    }

    #[test]
    fn test_cli_args_win() {
        let mut config = PipelineConfig::default();
        config.api.cloud_name = Some("demo".to_string());

        let args = CliArgs::parse_from([
            "imgpipe",
            "--api-url",
            "http://127.0.0.1:9000/api",
            "--log-level",
            "trace",
            "--no-cdn",
            "failures",
        ]);
        config.merge_with_args(&args);

        assert_eq!(config.api.base_url, "http://127.0.0.1:9000/api");
        assert_eq!(config.log_level, LogLevel::Trace);
        assert_eq!(config.api.cloud_name, None);
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let mut config = PipelineConfig::default();
        assert!(config.validate().is_ok());

        config.compression.max_width_or_height = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "compression.max_width_or_height",
                ..
            })
        ));
    }
}
