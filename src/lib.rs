//! imgpipe - Resilient image delivery pipeline.
//!
//! This crate compresses images before upload, resolves canonical display
//! URLs from ids and legacy paths, loads images progressively through
//! quality tiers, retries transient failures and remembers URLs that failed.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "imgpipe";
