//! Wires the snapshot store, checkpoint writer, lifecycle manager and search
//! gateway around one vector service

use std::sync::Arc;

use tracing::{error, info};

use crate::config::Config;
use crate::index::{CloudReconciler, IndexLifecycleManager, ReconcileReport};
use crate::search::SearchGateway;
use crate::snapshot::{CheckpointWriter, SnapshotStore};
use crate::vector::VectorIndexService;

pub struct ContextEngine {
    config: Arc<Config>,
    store: Arc<SnapshotStore>,
    checkpoints: Arc<CheckpointWriter>,
    reconciler: Arc<CloudReconciler>,
    manager: IndexLifecycleManager,
    gateway: SearchGateway,
}

impl ContextEngine {
    /// Load the snapshot and start the checkpoint writer.
    /// Must be called from within a tokio runtime.
    pub fn open(config: Arc<Config>, service: Arc<dyn VectorIndexService>) -> Self {
        let store = Arc::new(SnapshotStore::open(config.snapshot_path.clone()));
        info!(
            "Loaded {} codebase record(s) from {}",
            store.len(),
            store.path().display()
        );

        let checkpoints = Arc::new(CheckpointWriter::spawn(
            store.clone(),
            config.checkpoint_interval,
        ));
        let reconciler = Arc::new(CloudReconciler::new(service.clone(), store.clone()));
        let manager = IndexLifecycleManager::new(
            service.clone(),
            store.clone(),
            checkpoints.clone(),
            reconciler.clone(),
        );
        let gateway = SearchGateway::new(config.clone(), service, store.clone(), reconciler.clone());

        Self {
            config,
            store,
            checkpoints,
            reconciler,
            manager,
            gateway,
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn manager(&self) -> &IndexLifecycleManager {
        &self.manager
    }

    pub fn gateway(&self) -> &SearchGateway {
        &self.gateway
    }

    pub async fn reconcile(&self) -> ReconcileReport {
        self.reconciler.reconcile().await
    }

    /// Abort running tasks, flush pending progress and write a final snapshot
    pub async fn shutdown(&self) {
        let aborted = self.manager.abort_all();
        if aborted > 0 {
            info!("Aborted {} running indexing task(s)", aborted);
        }
        self.checkpoints.shutdown().await;
        if let Err(e) = self.store.save() {
            error!("Failed to save snapshot on shutdown: {:#}", e);
        }
    }
}
