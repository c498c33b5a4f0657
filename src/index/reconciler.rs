//! Aligns local snapshot records with the collections present in the vector store

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::snapshot::{IndexStatus, SnapshotStore};
use crate::vector::{is_code_collection, QueryRow, VectorIndexService};

/// Metadata key naming the codebase a collection was built from
const CODEBASE_PATH_FIELD: &str = "codebasePath";

/// What a reconciliation pass observed and changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Codebase paths the remote store reports as indexed
    pub remote_known: BTreeSet<String>,
    /// Local records removed because the remote store no longer has them
    pub removed: Vec<String>,
    /// True when pruning was skipped because the remote view was incomplete
    pub skipped: bool,
}

pub struct CloudReconciler {
    service: Arc<dyn VectorIndexService>,
    store: Arc<SnapshotStore>,
}

impl CloudReconciler {
    pub fn new(service: Arc<dyn VectorIndexService>, store: Arc<SnapshotStore>) -> Self {
        Self { service, store }
    }

    /// Drop local records whose collections are gone.
    ///
    /// Only `indexed` records are pruned: an `indexing` record may not have a
    /// collection yet and an `indexfailed` one often never got one. Remote-only
    /// codebases are never added locally. Any listing or query failure skips pruning for the
    /// whole pass; failures are logged, never returned.
    pub async fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let collections = match self.service.list_collections().await {
            Ok(collections) => collections,
            Err(e) => {
                warn!("Reconcile skipped, failed to list collections: {:#}", e);
                report.skipped = true;
                return report;
            }
        };

        for collection in collections.iter().filter(|name| is_code_collection(name)) {
            match self.service.query(collection, "", &["metadata"], 1).await {
                Ok(rows) => match rows.first().and_then(codebase_path_from_row) {
                    Some(path) => {
                        debug!("Collection {} belongs to {}", collection, path);
                        report.remote_known.insert(path);
                    }
                    None => debug!("Collection {} has no codebase metadata", collection),
                },
                Err(e) => {
                    warn!("Failed to query collection {}: {:#}", collection, e);
                    report.skipped = true;
                }
            }
        }

        if report.skipped {
            warn!("Reconcile pruning skipped, remote view is incomplete");
            return report;
        }

        for (path, record) in self.store.entries() {
            if record.status() != IndexStatus::Indexed || report.remote_known.contains(&path) {
                continue;
            }
            if self.store.remove(&path).is_some() {
                info!("Removed stale record for {} (collection no longer exists)", path);
                report.removed.push(path);
            }
        }

        if !report.removed.is_empty() {
            if let Err(e) = self.store.save() {
                warn!("Failed to save snapshot after reconcile: {:#}", e);
            }
        }

        report
    }
}

/// Read `codebasePath` from a row's `metadata`, which may be a JSON string or an object
pub fn codebase_path_from_row(row: &QueryRow) -> Option<String> {
    let metadata = match row.get("metadata")? {
        Value::String(raw) => serde_json::from_str::<Value>(raw).ok()?,
        Value::Object(map) => Value::Object(map.clone()),
        _ => return None,
    };
    metadata
        .get(CODEBASE_PATH_FIELD)
        .and_then(Value::as_str)
        .filter(|path| !path.is_empty())
        .map(str::to_string)
}
