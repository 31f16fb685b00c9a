//! Sliding-window session identifier.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use tracking_core::Clock;
use tracking_storage::{KeyValueStore, StorageKeys};
use uuid::Uuid;

/// Idle time after which a new session starts.
pub const SESSION_TIMEOUT_MS: i64 = 30 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub id: String,
    pub last_activity: i64,
}

pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn read(&self) -> Option<SessionData> {
        let raw = match self.store.get(StorageKeys::SESSION) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read session");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(error = %e, "Discarding corrupted session");
                None
            }
        }
    }

    fn write(&self, session: &SessionData) {
        let result = serde_json::to_string(session)
            .map_err(tracking_storage::StorageError::from)
            .and_then(|data| self.store.set(StorageKeys::SESSION, &data));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist session");
        }
    }

    /// Current session id, refreshing its activity time; starts a new
    /// session when the last one has been idle for the timeout.
    pub fn get_or_create(&self) -> String {
        let now = self.clock.now_ms();

        let id = match self.read() {
            Some(session) if now - session.last_activity < SESSION_TIMEOUT_MS => session.id,
            _ => {
                let id = Uuid::new_v4().to_string();
                debug!(session_id = %id, "Starting new session");
                id
            }
        };

        self.write(&SessionData {
            id: id.clone(),
            last_activity: now,
        });
        id
    }

    /// Stored session without refreshing it.
    pub fn current(&self) -> Option<SessionData> {
        self.read()
    }

    pub fn clear(&self) -> bool {
        match self.store.remove(StorageKeys::SESSION) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Failed to clear session");
                false
            }
        }
    }
}
