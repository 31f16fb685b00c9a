//! Persistence for first touch, last touch and journey records.
//!
//! Reads validate and TTL-check what is stored; anything corrupted or expired
//! is removed and reported as absent.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use tracking_core::{AttributionTtlConfig, Clock, StorageBackend, TrackingConfig};
use tracking_storage::{KeyValueStore, StorageKeys};

use crate::{
    Attribution, AttributionData, AttributionError, AttributionResult, JourneyEntry, JourneyManager,
};

/// `now - timestamp > ttl`.
pub fn is_expired(timestamp: i64, ttl_ms: i64, now_ms: i64) -> bool {
    now_ms - timestamp > ttl_ms
}

/// Owns the persisted attribution keys.
///
/// First and last touch live in the configured backend (cookies or local
/// storage); the journey always lives in local storage.
pub struct AttributionStore {
    local: Arc<dyn KeyValueStore>,
    cookies: Arc<dyn KeyValueStore>,
    backend: StorageBackend,
    ttl: AttributionTtlConfig,
    journey: JourneyManager,
    clock: Arc<dyn Clock>,
}

impl AttributionStore {
    pub fn new(
        local: Arc<dyn KeyValueStore>,
        cookies: Arc<dyn KeyValueStore>,
        config: &TrackingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            local,
            cookies,
            backend: config.storage,
            ttl: config.attribution_ttl.clone(),
            journey: JourneyManager::new(
                config.attribution_ttl.journey_ms(),
                config.max_journey_size(),
            ),
            clock,
        }
    }

    pub fn journey_manager(&self) -> &JourneyManager {
        &self.journey
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    fn touch_store(&self) -> &dyn KeyValueStore {
        match self.backend {
            StorageBackend::Cookie => self.cookies.as_ref(),
            StorageBackend::LocalStorage => self.local.as_ref(),
        }
    }

    fn read_touch(&self, key: &str, ttl_ms: i64) -> Option<Attribution> {
        let store = self.touch_store();
        let raw = match store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read attribution");
                return None;
            }
        };

        let parsed = serde_json::from_str::<Value>(&raw)
            .map_err(AttributionError::from)
            .and_then(|value| Attribution::from_value(&value));

        match parsed {
            Ok(attribution) if !is_expired(attribution.timestamp, ttl_ms, self.now_ms()) => {
                Some(attribution)
            }
            Ok(_) => {
                debug!(key, "Attribution expired");
                self.remove_quietly(store, key);
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Clearing corrupted attribution");
                self.remove_quietly(store, key);
                None
            }
        }
    }

    fn write_touch(&self, key: &str, attribution: &Attribution, ttl_days: u32) -> AttributionResult<()> {
        let data = serde_json::to_string(attribution)?;
        self.touch_store().set_with_ttl(key, &data, ttl_days)?;
        Ok(())
    }

    fn remove_quietly(&self, store: &dyn KeyValueStore, key: &str) {
        if let Err(e) = store.remove(key) {
            warn!(key, error = %e, "Failed to remove attribution key");
        }
    }

    pub fn first_touch(&self) -> Option<Attribution> {
        self.read_touch(StorageKeys::FIRST_TOUCH, self.ttl.first_touch_ms())
    }

    pub fn last_touch(&self) -> Option<Attribution> {
        self.read_touch(StorageKeys::LAST_TOUCH, self.ttl.last_touch_ms())
    }

    pub fn set_first_touch(&self, attribution: &Attribution) -> AttributionResult<()> {
        self.write_touch(StorageKeys::FIRST_TOUCH, attribution, self.ttl.first_touch_days())
    }

    pub fn set_last_touch(&self, attribution: &Attribution) -> AttributionResult<()> {
        self.write_touch(StorageKeys::LAST_TOUCH, attribution, self.ttl.last_touch_days())
    }

    /// Removes the key from both backends.
    fn clear_touch(&self, key: &str) -> AttributionResult<()> {
        self.local.remove(key)?;
        self.cookies.remove(key)?;
        Ok(())
    }

    pub fn clear_first_touch(&self) -> AttributionResult<()> {
        self.clear_touch(StorageKeys::FIRST_TOUCH)
    }

    pub fn clear_last_touch(&self) -> AttributionResult<()> {
        self.clear_touch(StorageKeys::LAST_TOUCH)
    }

    /// Stored journey, oldest first, with invalid and expired entries removed.
    ///
    /// Writes the filtered list back when anything was dropped.
    pub fn journey(&self) -> Vec<JourneyEntry> {
        let key = StorageKeys::JOURNEY;
        let raw = match self.local.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read journey");
                return Vec::new();
            }
        };

        let entries = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) | Err(_) => {
                warn!("Clearing corrupted journey");
                self.remove_quietly(self.local.as_ref(), key);
                return Vec::new();
            }
        };

        let stored_len = entries.len();
        let mut journey: Vec<JourneyEntry> = entries
            .iter()
            .filter_map(|value| JourneyEntry::from_value(value).ok())
            .collect();
        self.journey.retain_unexpired(&mut journey, self.now_ms());

        if journey.len() != stored_len {
            debug!(
                stored = stored_len,
                kept = journey.len(),
                "Compacting journey"
            );
            if let Err(e) = self.set_journey(&journey) {
                warn!(error = %e, "Failed to write compacted journey");
            }
        }
        journey
    }

    pub fn set_journey(&self, journey: &[JourneyEntry]) -> AttributionResult<()> {
        let data = serde_json::to_string(journey)?;
        self.local.set(StorageKeys::JOURNEY, &data)?;
        Ok(())
    }

    pub fn clear_journey(&self) -> AttributionResult<()> {
        self.local.remove(StorageKeys::JOURNEY)?;
        Ok(())
    }

    /// Fresh read of all three records.
    pub fn snapshot(&self) -> AttributionData {
        AttributionData {
            first_touch: self.first_touch(),
            last_touch: self.last_touch(),
            journey: self.journey(),
        }
    }

    pub fn clear_all(&self) -> AttributionResult<()> {
        self.clear_first_touch()?;
        self.clear_last_touch()?;
        self.clear_journey()
    }

    /// Forget the touchpoints that led to a conversion while keeping first touch.
    pub fn clear_after_conversion(&self) -> AttributionResult<()> {
        self.clear_last_touch()?;
        self.clear_journey()
    }
}
