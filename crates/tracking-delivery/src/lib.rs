//! Event delivery with retry, an offline queue and a debug log.
//!
//! This crate provides:
//! - Transport: beacon and JSON POST primitives (`HttpTransport` over reqwest)
//! - EventSender: retry tier with exponential backoff and jitter
//! - OfflineQueue: persistent queue resent when connectivity returns
//! - DebugLog: capped, expiring copy of every event in debug mode
//! - DeliveryEngine: tiered delivery for one enriched event

mod debug_log;
mod engine;
mod error;
mod offline;
mod sender;
mod transport;

pub use debug_log::{DebugLog, DebugRecord, DebugSummary, DEBUG_LOG_CAPACITY, DEBUG_LOG_TTL_MS};
pub use engine::{DeliveryEngine, DeliveryOutcome, DeliverySettings};
pub use error::{DeliveryError, DeliveryResult};
pub use offline::{OfflineQueue, QueuedEvent};
pub use sender::{EventSender, RetryPolicy, SendOutcome};
pub use transport::{HttpTransport, SendFailure, Transport};
