//! Tiered delivery of enriched events.

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracking_core::{Clock, TrackingConfig};
use tracking_events::EnrichedEvent;
use tracking_storage::RecordStore;

use crate::{DebugLog, EventSender, OfflineQueue, RetryPolicy, SendOutcome, Transport};

/// Delivery-relevant slice of [`TrackingConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeliverySettings {
    /// `None` when delivery is disabled or no endpoint is configured
    pub endpoint: Option<String>,
    pub debug: bool,
    pub use_fetch_instead_of_beacon: bool,
    pub offline_queue: bool,
    pub offline_max_retries: u32,
    pub retry: RetryPolicy,
}

impl From<&TrackingConfig> for DeliverySettings {
    fn from(config: &TrackingConfig) -> Self {
        Self {
            endpoint: config.delivery_endpoint().map(str::to_string),
            debug: config.debug,
            use_fetch_instead_of_beacon: config.use_fetch_instead_of_beacon,
            offline_queue: config.delivery.offline_queue,
            offline_max_retries: config.delivery.offline_max_retries,
            retry: RetryPolicy::from(&config.delivery),
        }
    }
}

/// How an event left the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Delivery disabled or no endpoint; debug log only
    NotSent,
    /// Persisted to the offline queue
    Queued,
    /// Handed to the beacon
    Beaconed,
    Delivered { attempts: u32 },
    /// Terminal 4xx; dropped
    Rejected { status: u16 },
    /// Transient failures exhausted and nothing persisted
    Dropped { attempts: u32 },
}

/// Sends enriched events: debug log, then beacon, then retrying POST, then
/// the offline queue.
pub struct DeliveryEngine {
    settings: DeliverySettings,
    sender: EventSender,
    offline: OfflineQueue,
    debug_log: DebugLog,
}

impl DeliveryEngine {
    pub fn new(
        settings: DeliverySettings,
        transport: Arc<dyn Transport>,
        records: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sender = EventSender::new(transport, settings.retry);
        let offline = OfflineQueue::new(records.clone(), clock.clone(), settings.offline_max_retries);
        let debug_log = DebugLog::new(records, clock);
        Self {
            settings,
            sender,
            offline,
            debug_log,
        }
    }

    pub fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    pub fn offline_queue(&self) -> &OfflineQueue {
        &self.offline
    }

    pub fn debug_log(&self) -> &DebugLog {
        &self.debug_log
    }

    pub async fn deliver(&self, event: &EnrichedEvent, online: bool) -> DeliveryOutcome {
        if self.settings.debug {
            log_event_summary(event);
            if let Err(e) = self.debug_log.save(event).await {
                warn!(error = %e, "Failed to save debug event");
            }
        }

        let Some(endpoint) = self.settings.endpoint.as_deref() else {
            debug!("API disabled or no endpoint, event kept in debug log only");
            return DeliveryOutcome::NotSent;
        };

        if !online && self.settings.offline_queue {
            return self.enqueue(event, endpoint, 0).await;
        }

        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Failed to serialize event");
                return DeliveryOutcome::Dropped { attempts: 0 };
            }
        };

        if !self.settings.use_fetch_instead_of_beacon
            && self.sender.transport().beacon(endpoint, &payload)
        {
            debug!(endpoint = %endpoint, "Event handed to beacon");
            return DeliveryOutcome::Beaconed;
        }

        match self.sender.send(endpoint, &payload).await {
            SendOutcome::Delivered { attempts } => DeliveryOutcome::Delivered { attempts },
            SendOutcome::Rejected { status, .. } => DeliveryOutcome::Rejected { status },
            SendOutcome::Exhausted { attempts, .. } if self.settings.offline_queue => {
                self.enqueue(event, endpoint, attempts).await
            }
            SendOutcome::Exhausted { attempts, .. } => DeliveryOutcome::Dropped { attempts },
        }
    }

    async fn enqueue(&self, event: &EnrichedEvent, endpoint: &str, attempts: u32) -> DeliveryOutcome {
        match self.offline.enqueue(event, endpoint).await {
            Ok(_) => DeliveryOutcome::Queued,
            Err(e) => {
                error!(error = %e, "Failed to queue event offline");
                DeliveryOutcome::Dropped { attempts }
            }
        }
    }

    /// Resend the offline queue; returns how many events were delivered.
    pub async fn resync(&self, online: bool) -> usize {
        match self.offline.resync(&self.sender, online).await {
            Ok(synced) => synced,
            Err(e) => {
                error!(error = %e, "Offline resync failed");
                0
            }
        }
    }
}

fn log_event_summary(event: &EnrichedEvent) {
    let attribution = &event.attribution;
    info!(
        event_type = event.event.kind(),
        label = event.event.label(),
        timestamp = event.event.timestamp(),
        first_touch = attribution.first_touch.as_ref().map(|a| a.source.as_str()).unwrap_or(""),
        last_touch = attribution.last_touch.as_ref().map(|a| a.source.as_str()).unwrap_or(""),
        journey_len = attribution.journey.len(),
        session_id = %event.context.session_id,
        url = %event.context.url,
        "Tracking event"
    );
}
