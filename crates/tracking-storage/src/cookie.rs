//! Expiring cookie jar layered over a key-value store.

use crate::{KeyValueStore, StorageResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracking_core::{Clock, DAY_MS};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CookieEntry {
    value: String,
    expires_at: Option<i64>,
}

/// Cookie-style storage: values written with a lifetime disappear once it
/// elapses, values written without one live for the jar's lifetime.
pub struct CookieJar {
    inner: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl CookieJar {
    pub fn new(inner: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { inner, clock }
    }

    fn write(&self, key: &str, value: &str, expires_at: Option<i64>) -> StorageResult<()> {
        let entry = CookieEntry {
            value: value.to_string(),
            expires_at,
        };
        self.inner.set(key, &serde_json::to_string(&entry)?)
    }
}

impl KeyValueStore for CookieJar {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.write(key, value, None)
    }

    fn set_with_ttl(&self, key: &str, value: &str, ttl_days: u32) -> StorageResult<()> {
        let expires_at = self.clock.now_ms() + i64::from(ttl_days) * DAY_MS;
        self.write(key, value, Some(expires_at))
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let Some(raw) = self.inner.get(key)? else {
            return Ok(None);
        };

        // Values written before the envelope existed are returned as-is
        let Ok(entry) = serde_json::from_str::<CookieEntry>(&raw) else {
            return Ok(Some(raw));
        };

        match entry.expires_at {
            Some(expires_at) if expires_at <= self.clock.now_ms() => {
                debug!(key, "Cookie expired");
                self.inner.remove(key)?;
                Ok(None)
            }
            _ => Ok(Some(entry.value)),
        }
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        self.inner.remove(key)
    }

    fn usage_bytes(&self) -> StorageResult<usize> {
        self.inner.usage_bytes()
    }
}
