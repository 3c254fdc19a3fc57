//! Port for the persisted key-value store backing failure memory.

use crate::domain::errors::StoreError;

/// Synchronous string key-value store.
///
/// Implementations may be browser-style local storage, a file, an in-memory
/// map or a shared cache. Reads and writes are synchronous so callers can use
/// them from non-async contexts.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    /// Returns error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns error if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
