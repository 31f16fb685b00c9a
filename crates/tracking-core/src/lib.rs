//! Core types, configuration, and utilities shared by the tracking crates.

mod clock;
mod config;
mod error;
mod extensions;
mod logging;
mod paths;

pub use clock::{Clock, ManualClock, SystemClock, DAY_MS};
pub use config::{
    AttributionTtlConfig, CustomParamsConfig, CustomUtmConfig, DeliveryConfig, PageOverride,
    StorageBackend, TrackingConfig, DEFAULT_FIRST_TOUCH_TTL_DAYS, DEFAULT_JOURNEY_TTL_DAYS,
    DEFAULT_LAST_TOUCH_TTL_DAYS, DEFAULT_LOG_LEVEL, DEFAULT_MAX_JOURNEY_SIZE,
};
pub use error::{CoreError, CoreResult};
pub use extensions::{json_to_ext, ExtValue, Extensions};
pub use logging::{init_logging, init_logging_with, parse_level, LogConfig};
pub use paths::Paths;
