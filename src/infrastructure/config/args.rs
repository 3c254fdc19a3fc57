use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::app_config::LogLevel;
use crate::domain::entities::{Crop, Format, ImageId, ImageReference, Quality, TransformOptions};

#[derive(Debug, Parser)]
#[command(
    name = "imgpipe",
    version,
    about = "Resilient image delivery: compress, resolve and progressively load images",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Base API origin.
    #[arg(long, value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Static placeholder path.
    #[arg(long, value_name = "PATH", global = true)]
    pub fallback_url: Option<String>,

    /// CDN cloud name.
    #[arg(long, value_name = "NAME", global = true)]
    pub cloud_name: Option<String>,

    /// Disable transformation endpoints even if a cloud name is configured.
    #[arg(long, global = true)]
    pub no_cdn: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the display URL for an image reference.
    Resolve {
        #[command(flatten)]
        reference: ReferenceArgs,

        /// Also print the progressive attempt chain.
        #[arg(long)]
        chain: bool,
    },

    /// Compress image files into a directory.
    Compress {
        /// Input files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output directory.
        #[arg(short, long, value_name = "DIR", default_value = "compressed")]
        out_dir: PathBuf,

        #[command(flatten)]
        settings: CompressionArgs,
    },

    /// Load an image progressively and report the outcome.
    Load {
        #[command(flatten)]
        reference: ReferenceArgs,

        /// Write the final image bytes to this path.
        #[arg(long, value_name = "PATH")]
        save: Option<PathBuf>,
    },

    /// Compress then upload image files one at a time.
    Upload {
        /// Input files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Upload files as they are.
        #[arg(long)]
        no_compress: bool,

        #[command(flatten)]
        settings: CompressionArgs,
    },

    /// Check the redirect endpoint for an image id.
    Probe {
        /// Image id.
        id: String,
    },

    /// Warm a URL, remembering it if it fails.
    Preload {
        /// Absolute URL.
        url: String,
    },

    /// List remembered failed URLs, oldest first.
    Failures,
}

/// Image reference given on the command line.
#[derive(Debug, Clone, Args)]
pub struct ReferenceArgs {
    /// Image id.
    #[arg(long)]
    pub id: Option<String>,

    /// Direct or legacy image URL.
    #[arg(long)]
    pub url: Option<String>,

    /// Requested width in pixels.
    #[arg(long)]
    pub width: Option<u32>,

    /// Requested height in pixels.
    #[arg(long)]
    pub height: Option<u32>,

    /// Crop mode.
    #[arg(long, value_enum)]
    pub crop: Option<Crop>,

    /// Quality level 1-100. Omit for automatic quality.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// Output format.
    #[arg(long, value_enum)]
    pub format: Option<Format>,
}

impl ReferenceArgs {
    /// Builds the image reference.
    #[must_use]
    pub fn to_reference(&self) -> ImageReference {
        let mut options = TransformOptions {
            width: self.width.and_then(std::num::NonZeroU32::new),
            height: self.height.and_then(std::num::NonZeroU32::new),
            ..TransformOptions::default()
        };
        if let Some(crop) = self.crop {
            options = options.with_crop(crop);
        }
        if let Some(quality) = self.quality {
            options = options.with_quality(Quality::level(quality));
        }
        if let Some(format) = self.format {
            options = options.with_format(format);
        }

        ImageReference::new(self.id.clone().map(ImageId::new), self.url.clone()).with_options(options)
    }
}

/// Compression overrides.
#[derive(Debug, Clone, Args)]
pub struct CompressionArgs {
    /// Target size in megabytes.
    #[arg(long)]
    pub max_size_mb: Option<f64>,

    /// Longest side in pixels.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_dimension: Option<u32>,

    /// Encoder quality between 0 and 1.
    #[arg(long)]
    pub quality: Option<f32>,
}

impl CompressionArgs {
    /// Applies the overrides to `settings`.
    pub fn apply(&self, settings: &mut crate::domain::entities::CompressionSettings) {
        if let Some(max_size_mb) = self.max_size_mb {
            settings.max_size_mb = max_size_mb;
        }
        if let Some(max_dimension) = self.max_dimension {
            settings.max_width_or_height = max_dimension;
        }
        if let Some(quality) = self.quality {
            settings.quality = quality;
        }
    }
}
