//! Attribution error types.

use thiserror::Error;
use tracking_storage::StorageError;

/// Errors raised while capturing or persisting attribution.
#[derive(Error, Debug)]
pub enum AttributionError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Record failed structural validation
    #[error("Invalid attribution record: {0}")]
    InvalidRecord(String),
}

/// Result type alias using AttributionError.
pub type AttributionResult<T> = Result<T, AttributionError>;
