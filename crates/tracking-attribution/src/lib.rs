//! Attribution capture, persistence and journey tracking.
//!
//! - [`codec`]: URL/referrer to [`Attribution`] parsing
//! - [`capture`]: whether and what to capture on a navigation
//! - [`journey`]: bounded, deduplicated touchpoint history
//! - [`store`]: TTL-checked persistence of first touch, last touch and journey

pub mod capture;
pub mod codec;
mod error;
pub mod journey;
mod model;
pub mod store;

pub use capture::{capture_attribution, should_capture_attribution, CaptureInput, CaptureOutcome};
pub use codec::{has_utm_parameters, is_external_referrer, parse_attribution_from_url};
pub use error::{AttributionError, AttributionResult};
pub use journey::JourneyManager;
pub use model::{Attribution, AttributionData, JourneyEntry};
pub use store::{is_expired, AttributionStore};
