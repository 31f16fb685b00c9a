//! Debug-mode event log.
//!
//! Holds at most [`DEBUG_LOG_CAPACITY`] events, each expiring after
//! [`DEBUG_LOG_TTL_MS`]. Expired entries go first, then the oldest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use tracking_core::{Clock, DAY_MS};
use tracking_events::EnrichedEvent;
use tracking_storage::{RecordStore, StorageKeys, StoredRecord};
use uuid::Uuid;

use crate::DeliveryResult;

pub const DEBUG_LOG_CAPACITY: usize = 50;
pub const DEBUG_LOG_TTL_MS: i64 = 7 * DAY_MS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugRecord {
    pub id: String,
    pub event: EnrichedEvent,
    pub expires_at: i64,
}

/// Aggregate view of the debug log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSummary {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
    pub latest: Option<EnrichedEvent>,
}

#[derive(Clone)]
pub struct DebugLog {
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl DebugLog {
    pub fn new(records: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { records, clock }
    }

    pub async fn save(&self, event: &EnrichedEvent) -> DeliveryResult<()> {
        let collection = StorageKeys::DEBUG_EVENTS;
        let now = self.clock.now_ms();

        let expired = self.records.delete_expired(collection, now).await?;
        if expired > 0 {
            debug!(expired, "Removed expired debug events");
        }

        let mut live = self.records.get_unexpired(collection, now).await?;
        live.sort_by_key(|r| r.expires_at.unwrap_or(i64::MAX));
        let excess = (live.len() + 1).saturating_sub(DEBUG_LOG_CAPACITY);
        for record in live.iter().take(excess) {
            self.records.delete(collection, &record.id).await?;
        }

        let record = DebugRecord {
            id: Uuid::new_v4().to_string(),
            event: event.clone(),
            expires_at: now + DEBUG_LOG_TTL_MS,
        };
        self.records
            .add(
                collection,
                StoredRecord {
                    id: record.id.clone(),
                    created_at: now,
                    expires_at: Some(record.expires_at),
                    payload: serde_json::to_string(&record)?,
                },
            )
            .await?;
        Ok(())
    }

    /// Unexpired entries, newest event first.
    pub async fn list(&self) -> DeliveryResult<Vec<DebugRecord>> {
        let records = self
            .records
            .get_unexpired(StorageKeys::DEBUG_EVENTS, self.clock.now_ms())
            .await?;

        let mut entries: Vec<DebugRecord> = records
            .into_iter()
            .filter_map(|r| match serde_json::from_str(&r.payload) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(id = %r.id, error = %e, "Skipping corrupted debug event");
                    None
                }
            })
            .collect();
        entries.reverse();
        entries.sort_by(|a, b| b.event.event.timestamp().cmp(&a.event.event.timestamp()));
        Ok(entries)
    }

    pub async fn events(&self) -> DeliveryResult<Vec<EnrichedEvent>> {
        Ok(self.list().await?.into_iter().map(|r| r.event).collect())
    }

    pub async fn summary(&self) -> DeliveryResult<DebugSummary> {
        let events = self.events().await?;
        let mut by_type = BTreeMap::new();
        for event in &events {
            *by_type.entry(event.event.kind().to_string()).or_insert(0) += 1;
        }

        Ok(DebugSummary {
            total: events.len(),
            by_type,
            latest: events.into_iter().next(),
        })
    }

    pub async fn clear(&self) -> DeliveryResult<()> {
        self.records.clear(StorageKeys::DEBUG_EVENTS).await?;
        Ok(())
    }
}
