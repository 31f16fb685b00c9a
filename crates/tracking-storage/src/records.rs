//! Async record collections with creation-time and expiry indexes.
//!
//! Backs the offline delivery queue and the debug event log. Records are
//! opaque JSON payloads grouped by collection name.

use crate::StorageResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// A persisted record.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    /// Unix milliseconds
    pub created_at: i64,
    /// Unix milliseconds; `None` never expires
    pub expires_at: Option<i64>,
    /// JSON payload
    pub payload: String,
}

/// Async record storage keyed by collection and id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record, replacing any record with the same id.
    async fn put(&self, collection: &str, record: StoredRecord) -> StorageResult<()>;

    /// Insert a new record.
    async fn add(&self, collection: &str, record: StoredRecord) -> StorageResult<()> {
        self.put(collection, record).await
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<StoredRecord>>;

    /// All records, oldest `created_at` first.
    async fn get_all(&self, collection: &str) -> StorageResult<Vec<StoredRecord>>;

    /// Records not expired at `now_ms`, oldest `created_at` first.
    async fn get_unexpired(&self, collection: &str, now_ms: i64) -> StorageResult<Vec<StoredRecord>>;

    /// Delete a record, returning whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> StorageResult<bool>;

    /// Delete records expired at `now_ms`, returning how many were removed.
    async fn delete_expired(&self, collection: &str, now_ms: i64) -> StorageResult<usize>;

    async fn count(&self, collection: &str) -> StorageResult<usize>;

    async fn clear(&self, collection: &str) -> StorageResult<()>;
}

fn is_live(record: &StoredRecord, now_ms: i64) -> bool {
    record.expires_at.map_or(true, |expires_at| expires_at > now_ms)
}

/// In-memory record store for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    collections: Mutex<HashMap<String, Vec<StoredRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(records: &[StoredRecord]) -> Vec<StoredRecord> {
        let mut out = records.to_vec();
        out.sort_by_key(|r| r.created_at);
        out
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, collection: &str, record: StoredRecord) -> StorageResult<()> {
        let mut collections = self.collections.lock();
        let records = collections.entry(collection.to_string()).or_default();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<StoredRecord>> {
        Ok(self
            .collections
            .lock()
            .get(collection)
            .and_then(|records| records.iter().find(|r| r.id == id).cloned()))
    }

    async fn get_all(&self, collection: &str) -> StorageResult<Vec<StoredRecord>> {
        Ok(self
            .collections
            .lock()
            .get(collection)
            .map(|records| Self::sorted(records))
            .unwrap_or_default())
    }

    async fn get_unexpired(&self, collection: &str, now_ms: i64) -> StorageResult<Vec<StoredRecord>> {
        let mut records = self.get_all(collection).await?;
        records.retain(|r| is_live(r, now_ms));
        Ok(records)
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<bool> {
        let mut collections = self.collections.lock();
        let Some(records) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }

    async fn delete_expired(&self, collection: &str, now_ms: i64) -> StorageResult<usize> {
        let mut collections = self.collections.lock();
        let Some(records) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = records.len();
        records.retain(|r| is_live(r, now_ms));
        Ok(before - records.len())
    }

    async fn count(&self, collection: &str) -> StorageResult<usize> {
        Ok(self
            .collections
            .lock()
            .get(collection)
            .map_or(0, |records| records.len()))
    }

    async fn clear(&self, collection: &str) -> StorageResult<()> {
        self.collections.lock().remove(collection);
        Ok(())
    }
}
