//! File-backed snapshot store
//!
//! Holds the path → [`IndexRecord`] map in memory and persists the whole map
//! as one JSON document. Writes go to a temporary file that is renamed over
//! the target, so a crash mid-write leaves the previous snapshot intact.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::record::{IndexRecord, IndexStatus};

/// Snapshot document format version
pub const SNAPSHOT_FORMAT_VERSION: &str = "v2";

/// Persisted snapshot document
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotDocument {
    format_version: String,
    codebases: BTreeMap<String, IndexRecord>,
    last_updated: DateTime<Utc>,
}

/// Snapshot store
pub struct SnapshotStore {
    path: PathBuf,
    records: RwLock<BTreeMap<String, IndexRecord>>,
    /// Serializes file writes between the checkpoint writer and synchronous saves
    write_lock: Mutex<()>,
}

impl SnapshotStore {
    /// Open the store at `path`, loading whatever was persisted there
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = Self::load(&path);
        debug!(
            "Loaded snapshot from {} ({} codebases)",
            path.display(),
            records.len()
        );

        Self {
            path,
            records: RwLock::new(records),
            write_lock: Mutex::new(()),
        }
    }

    /// Load records from file; a missing or unreadable snapshot yields an empty map
    fn load(path: &Path) -> BTreeMap<String, IndexRecord> {
        if !path.exists() {
            return BTreeMap::new();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<SnapshotDocument>(&content) {
                Ok(doc) => {
                    if doc.format_version != SNAPSHOT_FORMAT_VERSION {
                        warn!(
                            "Snapshot format {} differs from {}, loading anyway",
                            doc.format_version, SNAPSHOT_FORMAT_VERSION
                        );
                    }
                    doc.codebases
                }
                Err(e) => {
                    warn!("Failed to parse snapshot file, starting empty: {}", e);
                    BTreeMap::new()
                }
            },
            Err(e) => {
                error!("Failed to load snapshot: {}", e);
                BTreeMap::new()
            }
        }
    }

    /// Snapshot file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<IndexRecord> {
        self.read().get(key).cloned()
    }

    /// Status of `key`; absent paths are `not_found`
    pub fn status(&self, key: &str) -> IndexStatus {
        self.read()
            .get(key)
            .map(IndexRecord::status)
            .unwrap_or(IndexStatus::NotFound)
    }

    pub fn paths(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, IndexRecord)> {
        self.read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Insert or replace the record for `key`
    pub fn set(&self, key: &str, record: IndexRecord) {
        self.write().insert(key.to_string(), record);
    }

    pub fn remove(&self, key: &str) -> Option<IndexRecord> {
        self.write().remove(key)
    }

    /// Update the progress of an `indexing` record.
    ///
    /// Returns false when the record is missing or no longer indexing, so a
    /// late progress report can never resurrect a terminal record.
    pub fn update_progress(&self, key: &str, percentage: u8) -> bool {
        let mut records = self.write();
        match records.get_mut(key) {
            Some(IndexRecord::Indexing {
                indexing_percentage,
                last_updated,
            }) => {
                *indexing_percentage = percentage.min(100);
                *last_updated = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Persist the current records atomically
    pub fn save(&self) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let doc = SnapshotDocument {
            format_version: SNAPSHOT_FORMAT_VERSION.to_string(),
            codebases: self.read().clone(),
            last_updated: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&doc)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create snapshot directory {}", parent.display())
                })?;
            }
        }

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Snapshot saved ({} codebases)", doc.codebases.len());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, IndexRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, IndexRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}
