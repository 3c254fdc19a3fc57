//! Image handling infrastructure.
//!
//! This module provides:
//! - Client-side compression before upload
//! - CDN URL transformation and resolution
//! - A persisted memory of failed URLs
//! - Progressive, tiered image loading

pub mod cdn;
pub mod compression;
pub mod failure_memory;
pub mod loader;
pub mod resolver;
pub mod surface;

pub use cdn::{
    extract_public_id, is_cdn_url, is_transformation_endpoint, strip_cache_buster,
    transformed_url, with_cache_buster,
};
pub use compression::{CompressionEngine, target_dimensions};
pub use failure_memory::{FAILED_URLS_KEY, FailureMemory};
pub use loader::ProgressiveLoader;
pub use resolver::{Endpoints, Resolution, TierDelays, UrlResolver, probe_redirect};
pub use surface::{Displayed, HttpImageSurface};
