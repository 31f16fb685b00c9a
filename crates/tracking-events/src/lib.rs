//! Tracking events, execution context and enrichment.

mod context;
mod enrich;
mod event;
mod validation;

pub use context::{Context, DeviceInfo, Dimensions};
pub use enrich::{enrich_event, EnrichedEvent, SCHEMA_VERSION};
pub use event::{CustomEvent, FunnelStepEvent, FunnelStepRecord, PageViewEvent, TrackingEvent};
pub use validation::{
    validate_event_name, validate_funnel_step, validate_page_value, FunnelWarning,
    ValidationError, MAX_EVENT_NAME_LEN,
};
