//! Index lifecycle manager
//!
//! Owns the state machine `not_found -> indexing -> indexed | indexfailed`
//! for every codebase path. Admission decisions for one path are serialized
//! behind a per-path lock, the indexing itself runs as a registered background
//! task, and every terminal transition is persisted before the task ends.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::error::{IndexError, Result};
use crate::snapshot::{CheckpointWriter, IndexCompletion, IndexRecord, IndexStatus, SnapshotStore};
use crate::vector::{IndexProgress, IndexingOptions, ProgressCallback, SplitterKind, VectorIndexService};

use super::reconciler::CloudReconciler;
use super::registry::TaskRegistry;
use super::validation::{
    lookup_key, parse_splitter, resolve_codebase_path, validate_extensions,
    validate_ignore_patterns,
};

/// Message recorded when a running task is cancelled
pub const CANCELLED_MESSAGE: &str = "indexing cancelled";

/// A request to index one codebase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexRequest {
    pub path: String,
    pub force: bool,
    pub splitter: Option<String>,
    pub custom_extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
}

impl IndexRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn splitter(mut self, splitter: impl Into<String>) -> Self {
        self.splitter = Some(splitter.into());
        self
    }
}

/// Acknowledgement that a background indexing task was started
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStarted {
    pub path: String,
    pub splitter: SplitterKind,
    /// Whether a previous index was cleared first
    pub forced: bool,
    pub custom_extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
}

/// Point-in-time status of one path
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStatusReport {
    pub path: String,
    pub status: IndexStatus,
    pub record: Option<IndexRecord>,
    /// Whether a live background task exists for the path
    pub task_running: bool,
}

impl IndexStatusReport {
    /// A record says indexing but nothing is working on it
    pub fn is_interrupted(&self) -> bool {
        self.status == IndexStatus::Indexing && !self.task_running
    }
}

/// Result of a successful clear
#[derive(Debug, Clone, PartialEq)]
pub struct ClearOutcome {
    pub path: String,
    pub previous: IndexRecord,
}

pub struct IndexLifecycleManager {
    service: Arc<dyn VectorIndexService>,
    store: Arc<SnapshotStore>,
    checkpoints: Arc<CheckpointWriter>,
    reconciler: Arc<CloudReconciler>,
    tasks: Arc<TaskRegistry>,
    admission: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IndexLifecycleManager {
    pub fn new(
        service: Arc<dyn VectorIndexService>,
        store: Arc<SnapshotStore>,
        checkpoints: Arc<CheckpointWriter>,
        reconciler: Arc<CloudReconciler>,
    ) -> Self {
        Self {
            service,
            store,
            checkpoints,
            reconciler,
            tasks: Arc::new(TaskRegistry::new()),
            admission: Mutex::new(HashMap::new()),
        }
    }

    /// Validate a request, decide admission and start background indexing.
    ///
    /// Returns once the `indexing` record is persisted; completion is
    /// observable through [`get_status`](Self::get_status).
    pub async fn request_index(&self, request: IndexRequest) -> Result<IndexStarted> {
        let key = resolve_codebase_path(&request.path)?;
        let splitter = parse_splitter(&key, request.splitter.as_deref())?;
        let custom_extensions = validate_extensions(&key, &request.custom_extensions)?;
        let ignore_patterns = validate_ignore_patterns(&key, &request.ignore_patterns)?;

        self.reconciler.reconcile().await;

        let gate = self.admission_lock(&key);
        let _admitted = gate.lock().await;

        let existing = self.store.get(&key);
        match &existing {
            Some(IndexRecord::Indexing {
                indexing_percentage,
                ..
            }) => {
                if self.tasks.is_running(&key) {
                    info!(
                        path = %key,
                        percentage = *indexing_percentage,
                        "Rejecting index request: already indexing"
                    );
                    return Err(IndexError::AlreadyIndexing {
                        path: key,
                        percentage: *indexing_percentage,
                    });
                }
                warn!(
                    path = %key,
                    percentage = *indexing_percentage,
                    "Found interrupted indexing, restarting"
                );
            }
            Some(IndexRecord::Indexed { .. }) if !request.force => {
                return Err(IndexError::AlreadyIndexed { path: key });
            }
            _ => {}
        }

        let forced = request.force && existing.is_some();
        if forced {
            info!(path = %key, "Force re-index requested, clearing existing index");
            self.service
                .clear_index(Path::new(&key))
                .await
                .map_err(|e| IndexError::service(&key, &e))?;
            self.store.remove(&key);
            self.persist(&key);
        }

        match self.service.check_collection_limit().await {
            Ok(true) => {}
            Ok(false) => {
                warn!(path = %key, "Collection limit reached, refusing to index");
                return Err(IndexError::CapacityExceeded { path: key });
            }
            Err(e) => return Err(IndexError::service(&key, &e)),
        }

        let options = IndexingOptions {
            splitter,
            custom_extensions: custom_extensions.clone(),
            ignore_patterns: ignore_patterns.clone(),
        };

        self.store.set(&key, IndexRecord::indexing(0));
        self.persist(&key);
        self.spawn_indexing(key.clone(), options);

        info!(path = %key, %splitter, "Started background indexing");

        Ok(IndexStarted {
            path: key,
            splitter,
            forced,
            custom_extensions,
            ignore_patterns,
        })
    }

    /// Current status of a path. Never touches the network.
    pub fn get_status(&self, path: &str) -> Result<IndexStatusReport> {
        let key = lookup_key(path)?;
        Ok(self.status_of(key))
    }

    /// Drop the remote index and local record of a path that is not being indexed
    pub async fn clear_index(&self, path: &str) -> Result<ClearOutcome> {
        let key = lookup_key(path)?;

        let gate = self.admission_lock(&key);
        let _admitted = gate.lock().await;

        let Some(previous) = self.store.get(&key) else {
            return Err(IndexError::NotIndexed { path: key });
        };

        if let IndexRecord::Indexing {
            indexing_percentage,
            ..
        } = previous
        {
            if self.tasks.is_running(&key) {
                return Err(IndexError::ClearWhileIndexing {
                    path: key,
                    percentage: indexing_percentage,
                });
            }
        }

        self.service
            .clear_index(Path::new(&key))
            .await
            .map_err(|e| IndexError::service(&key, &e))?;

        self.store.remove(&key);
        self.persist(&key);
        info!(path = %key, "Cleared index");

        Ok(ClearOutcome {
            path: key,
            previous,
        })
    }

    /// Abort the running task for a path and record it as failed
    pub async fn cancel_indexing(&self, path: &str) -> Result<IndexStatusReport> {
        let key = lookup_key(path)?;

        let gate = self.admission_lock(&key);
        let _admitted = gate.lock().await;

        if !self.tasks.abort(&key) {
            return Err(IndexError::NotIndexing { path: key });
        }

        if let Some(IndexRecord::Indexing {
            indexing_percentage,
            ..
        }) = self.store.get(&key)
        {
            self.store.set(
                &key,
                IndexRecord::failed(CANCELLED_MESSAGE, Some(indexing_percentage)),
            );
            self.persist(&key);
        }
        info!(path = %key, "Cancelled indexing");

        Ok(self.status_of(key))
    }

    /// Wait for the background task of a path to finish.
    /// Returns false when no task was ever started for it.
    pub async fn wait_for_indexing(&self, path: &str) -> Result<bool> {
        let key = lookup_key(path)?;
        Ok(self.tasks.wait(&key).await)
    }

    /// Paths with a live indexing task
    pub fn running(&self) -> Vec<String> {
        self.tasks.running()
    }

    /// Abort all tasks. Their records stay `indexing` and are picked up as
    /// interrupted on the next request.
    pub fn abort_all(&self) -> usize {
        self.tasks.abort_all()
    }

    fn status_of(&self, key: String) -> IndexStatusReport {
        let record = self.store.get(&key);
        IndexStatusReport {
            status: record
                .as_ref()
                .map(IndexRecord::status)
                .unwrap_or(IndexStatus::NotFound),
            task_running: self.tasks.is_running(&key),
            record,
            path: key,
        }
    }

    fn admission_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.admission.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(key.to_string()).or_default().clone()
    }

    fn persist(&self, key: &str) {
        if let Err(e) = self.store.save() {
            error!(path = %key, "Failed to persist snapshot: {:#}", e);
        }
    }

    fn spawn_indexing(&self, key: String, options: IndexingOptions) {
        let task = run_indexing(
            self.service.clone(),
            self.store.clone(),
            self.checkpoints.clone(),
            key.clone(),
            options,
        );
        self.tasks.spawn(&key, task);
    }
}

async fn run_indexing(
    service: Arc<dyn VectorIndexService>,
    store: Arc<SnapshotStore>,
    checkpoints: Arc<CheckpointWriter>,
    key: String,
    options: IndexingOptions,
) {
    let last_percentage = Arc::new(AtomicU8::new(0));

    let on_progress: ProgressCallback = {
        let store = store.clone();
        let key = key.clone();
        let last_percentage = last_percentage.clone();
        Arc::new(move |progress: IndexProgress| {
            last_percentage.store(progress.percentage, Ordering::Relaxed);
            if store.update_progress(&key, progress.percentage) {
                checkpoints.notify();
            }
            debug!(
                "[{}] {} ({}/{}) {}%",
                key, progress.phase, progress.current, progress.total, progress.percentage
            );
        })
    };

    let started = Instant::now();
    let codebase = PathBuf::from(&key);
    let result = AssertUnwindSafe(service.index_codebase(&codebase, &options, on_progress))
        .catch_unwind()
        .await;

    let last = last_percentage.load(Ordering::Relaxed);
    let record = match result {
        Ok(Ok(outcome)) => {
            if outcome.status == IndexCompletion::LimitReached {
                warn!(
                    path = %key,
                    chunks = outcome.total_chunks,
                    "Indexing stopped at the chunk limit"
                );
            }
            info!(
                path = %key,
                files = outcome.indexed_files,
                chunks = outcome.total_chunks,
                "Indexed in {:.1}s",
                started.elapsed().as_secs_f64()
            );
            IndexRecord::indexed(outcome.indexed_files, outcome.total_chunks, outcome.status)
        }
        Ok(Err(e)) => {
            error!(path = %key, percentage = last, "Indexing failed: {:#}", e);
            IndexRecord::failed(format!("{:#}", e), Some(last))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(path = %key, "Indexing task panicked: {}", message);
            IndexRecord::failed(format!("indexing task panicked: {}", message), Some(last))
        }
    };

    store.set(&key, record);
    if let Err(e) = store.save() {
        error!(path = %key, "Failed to persist final state: {:#}", e);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
