//! Pluggable error reporting.

use serde::Serialize;
use tracking_core::{StorageBackend, TrackingConfig};

/// Configuration facts attached to reported errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    pub api_endpoint: Option<String>,
    pub debug: bool,
    pub storage: StorageBackend,
}

impl From<&TrackingConfig> for ConfigSnapshot {
    fn from(config: &TrackingConfig) -> Self {
        Self {
            api_endpoint: config.api_endpoint.clone(),
            debug: config.debug,
            storage: config.storage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    /// Public operation that failed
    pub function: &'static str,
    pub url: String,
    pub referrer: Option<String>,
    pub config: ConfigSnapshot,
    pub timestamp: i64,
}

/// Receives errors caught inside the engine. Must not panic.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &(dyn std::error::Error + 'static), context: &ErrorContext);
}
