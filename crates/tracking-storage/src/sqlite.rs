//! SQLite-backed record store.
//!
//! All statements run on the tokio-rusqlite connection thread; callers only
//! await results. Keep closures passed to `call` limited to SQL and row
//! mapping.

use crate::{RecordStore, StorageError, StorageResult, StoredRecord};
use async_trait::async_trait;
use rusqlite::{params, Connection as SqlConnection, OptionalExtension, Row};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
const CURRENT_VERSION: i32 = 1;

fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> StorageError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => StorageError::Sqlite(e),
        tokio_rusqlite::Error::Close(_) => StorageError::Connection("Connection closed".to_string()),
        other => StorageError::Connection(other.to_string()),
    }
}

fn run_migrations(conn: &SqlConnection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;

    if current_version < 1 {
        conn.execute_batch(
            "
            CREATE TABLE records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER,
                payload TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );
            CREATE INDEX idx_records_created ON records(collection, created_at);
            CREATE INDEX idx_records_expires ON records(collection, expires_at);
            ",
        )?;
        conn.execute(
            "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
            params![1, "records"],
        )?;
        debug!(version = 1, "Migration applied");
    }

    debug!(target_version = CURRENT_VERSION, "Migrations complete");
    Ok(())
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    Ok(StoredRecord {
        id: row.get(0)?,
        created_at: row.get(1)?,
        expires_at: row.get(2)?,
        payload: row.get(3)?,
    })
}

/// Record store persisted in a SQLite database.
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    /// Open (or create) the database at `path` and run pending migrations.
    pub async fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "Opening record database");
        let conn = Connection::open(path)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        conn.call(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
            Ok(())
        })
        .await
        .map_err(from_tokio_rusqlite)?;

        Self::init(conn).await
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> StorageResult<Self> {
        conn.call(|conn| {
            run_migrations(conn)?;
            Ok(())
        })
        .await
        .map_err(from_tokio_rusqlite)?;
        Ok(Self { conn })
    }

    async fn query_records(
        &self,
        sql: &'static str,
        collection: &str,
        now_ms: Option<i64>,
    ) -> StorageResult<Vec<StoredRecord>> {
        let collection = collection.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(sql)?;
                let rows = match now_ms {
                    Some(now) => stmt
                        .query_map(params![collection, now], row_to_record)?
                        .collect::<Result<Vec<_>, _>>()?,
                    None => stmt
                        .query_map(params![collection], row_to_record)?
                        .collect::<Result<Vec<_>, _>>()?,
                };
                Ok(rows)
            })
            .await
            .map_err(from_tokio_rusqlite)
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn put(&self, collection: &str, record: StoredRecord) -> StorageResult<()> {
        let collection = collection.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO records (collection, id, created_at, expires_at, payload)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        collection,
                        record.id,
                        record.created_at,
                        record.expires_at,
                        record.payload
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(from_tokio_rusqlite)
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<StoredRecord>> {
        let collection = collection.to_string();
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let record = conn
                    .query_row(
                        "SELECT id, created_at, expires_at, payload FROM records
                         WHERE collection = ?1 AND id = ?2",
                        params![collection, id],
                        row_to_record,
                    )
                    .optional()?;
                Ok(record)
            })
            .await
            .map_err(from_tokio_rusqlite)
    }

    async fn get_all(&self, collection: &str) -> StorageResult<Vec<StoredRecord>> {
        self.query_records(
            "SELECT id, created_at, expires_at, payload FROM records
             WHERE collection = ?1 ORDER BY created_at ASC, rowid ASC",
            collection,
            None,
        )
        .await
    }

    async fn get_unexpired(&self, collection: &str, now_ms: i64) -> StorageResult<Vec<StoredRecord>> {
        self.query_records(
            "SELECT id, created_at, expires_at, payload FROM records
             WHERE collection = ?1 AND (expires_at IS NULL OR expires_at > ?2)
             ORDER BY created_at ASC, rowid ASC",
            collection,
            Some(now_ms),
        )
        .await
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<bool> {
        let collection = collection.to_string();
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM records WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                )?;
                Ok(n > 0)
            })
            .await
            .map_err(from_tokio_rusqlite)
    }

    async fn delete_expired(&self, collection: &str, now_ms: i64) -> StorageResult<usize> {
        let collection = collection.to_string();
        self.conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM records
                     WHERE collection = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
                    params![collection, now_ms],
                )?;
                Ok(n)
            })
            .await
            .map_err(from_tokio_rusqlite)
    }

    async fn count(&self, collection: &str) -> StorageResult<usize> {
        let collection = collection.to_string();
        self.conn
            .call(move |conn| {
                let n: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM records WHERE collection = ?1",
                    params![collection],
                    |row| row.get(0),
                )?;
                Ok(n as usize)
            })
            .await
            .map_err(from_tokio_rusqlite)
    }

    async fn clear(&self, collection: &str) -> StorageResult<()> {
        let collection = collection.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM records WHERE collection = ?1", params![collection])?;
                Ok(())
            })
            .await
            .map_err(from_tokio_rusqlite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: &str, created_at: i64, expires_at: Option<i64>) -> StoredRecord {
        StoredRecord {
            id: id.to_string(),
            created_at,
            expires_at,
            payload: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sqlite_roundtrip_and_ordering() {
        let store = SqliteRecordStore::open_in_memory().await.unwrap();
        store.add("offline_events", record("b", 2, None)).await.unwrap();
        store.add("offline_events", record("a", 1, None)).await.unwrap();

        let all = store.get_all("offline_events").await.unwrap();
        assert_eq!(all[0].id, "a");
        assert_eq!(all[1].id, "b");
        assert_eq!(
            store.get("offline_events", "b").await.unwrap(),
            Some(record("b", 2, None))
        );
        assert!(store.get("debug_events", "b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_expiry() {
        let store = SqliteRecordStore::open_in_memory().await.unwrap();
        store.add("debug_events", record("old", 1, Some(10))).await.unwrap();
        store.add("debug_events", record("new", 2, Some(100))).await.unwrap();

        assert_eq!(store.get_unexpired("debug_events", 50).await.unwrap().len(), 1);
        assert_eq!(store.delete_expired("debug_events", 50).await.unwrap(), 1);
        assert_eq!(store.count("debug_events").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_persists_to_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.sqlite");

        {
            let store = SqliteRecordStore::open(&path).await.unwrap();
            store.add("offline_events", record("x", 1, None)).await.unwrap();
            assert!(!store.delete("offline_events", "missing").await.unwrap());
        }

        let reopened = SqliteRecordStore::open(&path).await.unwrap();
        assert_eq!(reopened.count("offline_events").await.unwrap(), 1);
        reopened.clear("offline_events").await.unwrap();
        assert_eq!(reopened.count("offline_events").await.unwrap(), 0);
    }
}
