//! In-memory key-value store.

use crate::{KeyValueStore, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Process-local store, optionally with a byte quota like browser storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes pushing total usage past `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }
}

fn usage(data: &HashMap<String, String>) -> usize {
    data.iter().map(|(k, v)| k.len() + v.len()).sum()
}

impl KeyValueStore for MemoryStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.lock();
        if let Some(quota) = self.quota_bytes {
            let existing = data.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
            if usage(&data) - existing + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded(key.to_string()));
            }
        }
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.lock().remove(key).is_some())
    }

    fn usage_bytes(&self) -> StorageResult<usize> {
        Ok(usage(&self.data.lock()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let storage = MemoryStore::new();

        storage.set("test_key", "test_value").unwrap();
        assert_eq!(storage.get("test_key").unwrap(), Some("test_value".to_string()));

        assert!(storage.has("test_key").unwrap());
        assert!(!storage.has("nonexistent").unwrap());
        assert_eq!(storage.usage_bytes().unwrap(), "test_key".len() + "test_value".len());

        assert!(storage.remove("test_key").unwrap());
        assert!(!storage.remove("test_key").unwrap());
        assert_eq!(storage.get("test_key").unwrap(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_memory_store_quota() {
        let storage = MemoryStore::with_quota(10);
        storage.set("a", "12345").unwrap();

        let err = storage.set("b", "1234567890").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded(_)));

        // Overwriting an existing key only counts the difference
        storage.set("a", "123456789").unwrap();
        assert_eq!(storage.len(), 1);
    }
}
