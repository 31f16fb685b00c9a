//! File system paths for host processes that persist tracking state.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths under the tracking base directory.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory (~/.tracking)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.tracking`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".tracking"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory.
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.tracking/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Key-value store standing in for browser local storage.
    pub fn local_storage_file(&self) -> PathBuf {
        self.base_dir.join("local_storage.json")
    }

    /// Key-value store standing in for the cookie jar.
    pub fn cookie_file(&self) -> PathBuf {
        self.base_dir.join("cookies.json")
    }

    /// SQLite database holding the offline queue and debug log.
    pub fn records_database(&self) -> PathBuf {
        self.base_dir.join("records.sqlite")
    }

    /// Get the logs directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file path.
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("tracking.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
