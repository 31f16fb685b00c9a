//! Persistent queue for events that could not be delivered.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracking_core::Clock;
use tracking_events::EnrichedEvent;
use tracking_storage::{RecordStore, StorageKeys, StoredRecord};
use uuid::Uuid;

use crate::{DeliveryResult, EventSender};

/// Queued event as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedEvent {
    pub id: String,
    pub event: EnrichedEvent,
    pub endpoint: String,
    pub created_at: i64,
    pub retries: u32,
}

impl QueuedEvent {
    fn to_record(&self) -> DeliveryResult<StoredRecord> {
        Ok(StoredRecord {
            id: self.id.clone(),
            created_at: self.created_at,
            expires_at: None,
            payload: serde_json::to_string(self)?,
        })
    }
}

/// Offline queue over a [`RecordStore`] collection.
#[derive(Clone)]
pub struct OfflineQueue {
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    max_retries: u32,
}

impl OfflineQueue {
    pub fn new(records: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, max_retries: u32) -> Self {
        Self {
            records,
            clock,
            max_retries,
        }
    }

    /// Persist an event for later resync, returning its id.
    pub async fn enqueue(&self, event: &EnrichedEvent, endpoint: &str) -> DeliveryResult<String> {
        let queued = QueuedEvent {
            id: Uuid::new_v4().to_string(),
            event: event.clone(),
            endpoint: endpoint.to_string(),
            created_at: self.clock.now_ms(),
            retries: 0,
        };
        self.records
            .add(StorageKeys::OFFLINE_EVENTS, queued.to_record()?)
            .await?;

        info!(id = %queued.id, endpoint = %endpoint, "Event queued offline");
        Ok(queued.id)
    }

    /// Queued events, oldest first. Unreadable records are removed.
    pub async fn pending(&self) -> DeliveryResult<Vec<QueuedEvent>> {
        let records = self.records.get_all(StorageKeys::OFFLINE_EVENTS).await?;
        let mut events = Vec::with_capacity(records.len());

        for record in records {
            match serde_json::from_str::<QueuedEvent>(&record.payload) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(id = %record.id, error = %e, "Dropping corrupted offline event");
                    self.records
                        .delete(StorageKeys::OFFLINE_EVENTS, &record.id)
                        .await?;
                }
            }
        }
        Ok(events)
    }

    pub async fn pending_count(&self) -> DeliveryResult<usize> {
        Ok(self.records.count(StorageKeys::OFFLINE_EVENTS).await?)
    }

    /// Resend queued events through `sender`.
    ///
    /// Does nothing while offline. Events that already used up their retries
    /// are dropped; delivered events are removed; failures bump the retry
    /// counter. Returns how many events were delivered.
    pub async fn resync(&self, sender: &EventSender, online: bool) -> DeliveryResult<usize> {
        if !online {
            debug!("Offline, skipping resync");
            return Ok(0);
        }

        let events = self.pending().await?;
        if events.is_empty() {
            return Ok(0);
        }
        info!(count = events.len(), "Resyncing offline events");

        let mut synced = 0;
        for mut queued in events {
            if queued.retries >= self.max_retries {
                warn!(id = %queued.id, retries = queued.retries, "Dropping offline event after max retries");
                self.records
                    .delete(StorageKeys::OFFLINE_EVENTS, &queued.id)
                    .await?;
                continue;
            }

            let payload = serde_json::to_string(&queued.event)?;
            if sender.send(&queued.endpoint, &payload).await.is_delivered() {
                self.records
                    .delete(StorageKeys::OFFLINE_EVENTS, &queued.id)
                    .await?;
                synced += 1;
            } else {
                queued.retries += 1;
                debug!(id = %queued.id, retries = queued.retries, "Offline event resend failed");
                self.records
                    .put(StorageKeys::OFFLINE_EVENTS, queued.to_record()?)
                    .await?;
            }
        }

        info!(synced, "Offline resync complete");
        Ok(synced)
    }

    pub async fn clear(&self) -> DeliveryResult<()> {
        self.records.clear(StorageKeys::OFFLINE_EVENTS).await?;
        Ok(())
    }
}
