//! Network primitives.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::DeliveryResult;

/// Why a single POST did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendFailure {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("Network error: {0}")]
    Network(String),
}

impl SendFailure {
    /// Client errors are not retried.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SendFailure::Status(status) if (400..500).contains(status))
    }
}

/// Delivery primitives consumed by the engine.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fire-and-forget send that must not block the caller.
    ///
    /// Returns whether the payload was handed off.
    fn beacon(&self, endpoint: &str, payload: &str) -> bool;

    /// POST a JSON body and wait for the response status.
    async fn post_json(&self, endpoint: &str, payload: &str) -> Result<(), SendFailure>;
}

/// reqwest-backed transport.
///
/// The beacon hands the request to a detached tokio task, so it is only
/// available inside a runtime.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    beacon_enabled: bool,
}

impl HttpTransport {
    pub fn new(timeout_secs: u64) -> DeliveryResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            beacon_enabled: true,
        })
    }

    /// Disable the beacon so every event goes through the retry tier.
    pub fn without_beacon(mut self) -> Self {
        self.beacon_enabled = false;
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn beacon(&self, endpoint: &str, payload: &str) -> bool {
        if !self.beacon_enabled {
            return false;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return false;
        };

        let request = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string());
        let endpoint = endpoint.to_string();

        handle.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(endpoint = %endpoint, "Beacon delivered");
                }
                Ok(response) => {
                    warn!(endpoint = %endpoint, status = response.status().as_u16(), "Beacon rejected");
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "Beacon failed");
                }
            }
        });
        true
    }

    async fn post_json(&self, endpoint: &str, payload: &str) -> Result<(), SendFailure> {
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| SendFailure::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SendFailure::Status(status.as_u16()))
        }
    }
}
