//! Delivery error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Record storage error
    #[error("Storage error: {0}")]
    Storage(#[from] tracking_storage::StorageError),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using DeliveryError.
pub type DeliveryResult<T> = Result<T, DeliveryError>;
