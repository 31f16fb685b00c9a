//! Storage abstractions for the tracking engine.
//!
//! This crate provides:
//! - **KeyValueStore**: synchronous string storage (local storage, cookies)
//!   with `MemoryStore`, `FileStore` and the expiring `CookieJar`
//! - **RecordStore**: async keyed record collections with creation and expiry
//!   indexes, backed by `MemoryRecordStore` or SQLite (`SqliteRecordStore`)

mod cookie;
mod file;
mod keys;
mod memory;
mod records;
mod sqlite;
mod traits;

pub use cookie::CookieJar;
pub use file::FileStore;
pub use keys::StorageKeys;
pub use memory::MemoryStore;
pub use records::{MemoryRecordStore, RecordStore, StoredRecord};
pub use sqlite::SqliteRecordStore;
pub use traits::KeyValueStore;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend refused or failed the operation
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Write rejected because the store is full
    #[error("Storage quota exceeded for key: {0}")]
    QuotaExceeded(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
