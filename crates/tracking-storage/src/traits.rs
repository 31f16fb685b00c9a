//! Storage trait definitions.

use crate::StorageResult;

/// Synchronous string storage keyed by name.
pub trait KeyValueStore: Send + Sync {
    /// Store a value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value, returning whether it existed.
    fn remove(&self, key: &str) -> StorageResult<bool>;

    /// Store a value that the backend may expire after `ttl_days`.
    ///
    /// Backends without expiry support ignore the lifetime.
    fn set_with_ttl(&self, key: &str, value: &str, _ttl_days: u32) -> StorageResult<()> {
        self.set(key, value)
    }

    /// Check if a key exists.
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Approximate bytes used by keys and values.
    fn usage_bytes(&self) -> StorageResult<usize> {
        Ok(0)
    }
}
