//! Negative cache of CDN URLs known to fail.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::domain::ports::KeyValueStore;

use super::cdn::{is_transformation_endpoint, strip_cache_buster};

/// Store key holding the JSON array of failed URLs.
pub const FAILED_URLS_KEY: &str = "failed_cdn_urls";

/// Maximum number of remembered failures.
pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded, persisted set of URLs that previously failed to load.
///
/// Entries are evicted oldest-first once the capacity is reached. Lookups
/// never reorder entries. Only transformation endpoints (CDN assets and the
/// backend redirect) are tracked, and URLs are compared without their
/// cache-busting parameter.
pub struct FailureMemory {
    store: Arc<dyn KeyValueStore>,
    capacity: NonZeroUsize,
    entries: Mutex<Option<LruCache<String, ()>>>,
}

impl std::fmt::Debug for FailureMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureMemory")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl FailureMemory {
    /// Creates a failure memory with the default capacity.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_capacity(store, DEFAULT_CAPACITY)
    }

    /// Creates a failure memory holding at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(store: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity: NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            entries: Mutex::new(None),
        }
    }

    /// Remembers that `url` failed. No-op for URLs outside the CDN family and
    /// for URLs already remembered.
    pub fn record(&self, url: &str) {
        if !is_transformation_endpoint(url) {
            trace!(url = %url, "Ignoring failure of URL without fallback path");
            return;
        }
        let key = strip_cache_buster(url);

        // Persist under the lock so writes land in the order entries changed.
        let mut guard = self.entries.lock();
        let entries = self.loaded(&mut guard);
        if entries.contains(&key) {
            return;
        }
        if let Some((evicted, ())) = entries.push(key.clone(), ()) {
            debug!(evicted = %evicted, "Evicted oldest failed URL");
        }
        debug!(url = %key, count = entries.len(), "Recorded failed URL");

        match serialize(entries) {
            Ok(json) => {
                if let Err(e) = self.store.set(FAILED_URLS_KEY, &json) {
                    warn!(error = %e, "Failed to persist failed URLs");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize failed URLs"),
        }
    }

    /// Returns true if `url` is known to fail.
    pub fn has_failed(&self, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }
        let key = strip_cache_buster(url);
        let mut guard = self.entries.lock();
        self.loaded(&mut guard).contains(&key)
    }

    /// Number of remembered failures.
    pub fn len(&self) -> usize {
        let mut guard = self.entries.lock();
        self.loaded(&mut guard).len()
    }

    /// Returns true if nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remembered URLs, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        let mut guard = self.entries.lock();
        self.loaded(&mut guard)
            .iter()
            .rev()
            .map(|(url, ())| url.clone())
            .collect()
    }

    fn loaded<'a>(
        &self,
        guard: &'a mut Option<LruCache<String, ()>>,
    ) -> &'a mut LruCache<String, ()> {
        guard.get_or_insert_with(|| self.load_from_store())
    }

    fn load_from_store(&self) -> LruCache<String, ()> {
        let mut entries = LruCache::new(self.capacity);

        let raw = match self.store.get(FAILED_URLS_KEY) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to read failed URLs, starting empty");
                None
            }
        };

        if let Some(raw) = raw {
            match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(urls) => {
                    for url in urls {
                        entries.push(url, ());
                    }
                }
                Err(e) => warn!(error = %e, "Ignoring malformed failed URL list"),
            }
        }

        debug!(count = entries.len(), "Loaded failed URLs");
        entries
    }
}

fn serialize(entries: &LruCache<String, ()>) -> Result<String, serde_json::Error> {
    let oldest_first: Vec<&String> = entries.iter().rev().map(|(url, ())| url).collect();
    serde_json::to_string(&oldest_first)
}
