//! Export and health snapshots.

use serde::Serialize;
use tracking_attribution::AttributionData;
use tracking_events::EnrichedEvent;

/// Everything the engine holds for the current visitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingExport {
    /// RFC 3339 export time
    pub timestamp: String,
    pub session_id: Option<String>,
    pub attribution: AttributionData,
    pub debug_events: Vec<EnrichedEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StorageHealth {
    pub available: bool,
    /// Approximate bytes held in local storage
    pub usage: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub initialized: bool,
    /// Calls waiting for initialization
    pub queue_size: usize,
    pub last_event_time: Option<i64>,
    pub storage: StorageHealth,
}
