//! Tracking engine: the host-facing API.
//!
//! A [`Tracker`] owns session state, the pre-initialization queue and the
//! global context, and wires attribution capture, enrichment and delivery
//! together. Construct one per host and share it by reference.

mod environment;
mod queue;
mod report;
mod reporter;
mod session;
mod tracker;

pub use environment::{Environment, StaticEnvironment};
pub use queue::{FunnelOptions, PageOptions, PendingCall, PreInitQueue, PRE_INIT_CAPACITY, PRE_INIT_MAX_AGE_MS};
pub use report::{HealthReport, StorageHealth, TrackingExport};
pub use reporter::{ConfigSnapshot, ErrorContext, ErrorReporter};
pub use session::{SessionData, SessionManager, SESSION_TIMEOUT_MS};
pub use tracker::{TrackOutcome, Tracker, TrackerParts};

pub use tracking_attribution::{Attribution, AttributionData, JourneyEntry};
pub use tracking_core::{ExtValue, Extensions, TrackingConfig};
pub use tracking_delivery::{DebugSummary, DeliveryOutcome};
pub use tracking_events::{EnrichedEvent, ValidationError};
