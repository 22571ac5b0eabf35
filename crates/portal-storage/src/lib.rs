//! Visitor counter persistence
//!
//! The controller keeps a single counter on disk. The file layout matches
//! what the controller has always written:
//!
//! ```json
//! { "visitor_count": 42, "last_updated": "2025-10-31T21:04:11Z" }
//! ```
//!
//! Writes go to a temp file first and are renamed into place.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A persisted counter
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Load the stored value; a missing store reads as zero
    async fn load(&self) -> StorageResult<u64>;

    /// Persist a new value
    async fn save(&self, count: u64) -> StorageResult<()>;
}

/// On-disk record
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VisitorFile {
    #[serde(default)]
    visitor_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<DateTime<Utc>>,
}

/// Counter stored as a JSON file
#[derive(Debug, Clone)]
pub struct JsonCounterStore {
    path: PathBuf,
}

impl JsonCounterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl CounterStore for JsonCounterStore {
    async fn load(&self) -> StorageResult<u64> {
        if !self.path.exists() {
            debug!("Visitor file not found: {:?}", self.path);
            return Ok(0);
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.io_err(e))?;
        let file: VisitorFile =
            serde_json::from_str(&content).map_err(|e| StorageError::Json {
                path: self.path.clone(),
                source: e,
            })?;

        debug!("Loaded visitor count {} from {:?}", file.visitor_count, self.path);
        Ok(file.visitor_count)
    }

    async fn save(&self, count: u64) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_err(e))?;
        }

        let record = VisitorFile {
            visitor_count: count,
            last_updated: Some(Utc::now()),
        };
        let content = serde_json::to_string_pretty(&record).map_err(|e| StorageError::Json {
            path: self.path.clone(),
            source: e,
        })?;

        let temp_path = self.temp_path();
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| self.io_err(e))?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| self.io_err(e))?;

        debug!("Saved visitor count {} to {:?}", count, self.path);
        Ok(())
    }
}

/// Counter kept in memory only
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    value: AtomicU64,
}

impl MemoryCounterStore {
    pub fn new(initial: u64) -> Self {
        Self {
            value: AtomicU64::new(initial),
        }
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn load(&self) -> StorageResult<u64> {
        Ok(self.value())
    }

    async fn save(&self, count: u64) -> StorageResult<()> {
        self.value.store(count, Ordering::SeqCst);
        Ok(())
    }
}
