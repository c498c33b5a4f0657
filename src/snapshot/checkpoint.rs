//! Coalescing writer for progress checkpoints
//!
//! Indexing tasks report progress far more often than it is worth hitting the
//! disk. They mark the snapshot dirty through [`CheckpointWriter::notify`]; the
//! writer task decides when to persist: immediately if the last save is older
//! than the interval, otherwise once when the interval elapses.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::store::SnapshotStore;

enum CheckpointEvent {
    /// In-memory progress changed
    Dirty,
    /// Persist now and acknowledge
    Flush(oneshot::Sender<()>),
    /// Persist pending changes, acknowledge and stop
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the background checkpoint writer
pub struct CheckpointWriter {
    tx: mpsc::UnboundedSender<CheckpointEvent>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CheckpointWriter {
    /// Spawn the writer on the current tokio runtime
    pub fn spawn(store: Arc<SnapshotStore>, interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(store, interval, rx));
        Self {
            tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Record that progress changed. Never blocks.
    pub fn notify(&self) {
        if self.tx.send(CheckpointEvent::Dirty).is_err() {
            debug!("Checkpoint writer stopped, dropping progress notification");
        }
    }

    /// Persist immediately and wait for the write to finish
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(CheckpointEvent::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Persist pending progress and stop the writer task
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(CheckpointEvent::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn run_writer(
    store: Arc<SnapshotStore>,
    interval: Duration,
    mut rx: mpsc::UnboundedReceiver<CheckpointEvent>,
) {
    let mut last_save: Option<Instant> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        let event = match deadline {
            Some(at) => tokio::select! {
                event = rx.recv() => event,
                _ = tokio::time::sleep_until(at) => {
                    persist(&store);
                    last_save = Some(Instant::now());
                    deadline = None;
                    continue;
                }
            },
            None => rx.recv().await,
        };

        match event {
            Some(CheckpointEvent::Dirty) => match last_save {
                Some(saved_at) if saved_at.elapsed() < interval => {
                    if deadline.is_none() {
                        deadline = Some(saved_at + interval);
                    }
                }
                _ => {
                    persist(&store);
                    last_save = Some(Instant::now());
                    deadline = None;
                }
            },
            Some(CheckpointEvent::Flush(ack)) => {
                persist(&store);
                last_save = Some(Instant::now());
                deadline = None;
                let _ = ack.send(());
            }
            Some(CheckpointEvent::Shutdown(ack)) => {
                if deadline.is_some() {
                    persist(&store);
                }
                let _ = ack.send(());
                break;
            }
            None => {
                if deadline.is_some() {
                    persist(&store);
                }
                break;
            }
        }
    }

    debug!("Checkpoint writer stopped");
}

fn persist(store: &SnapshotStore) {
    if let Err(e) = store.save() {
        warn!("Failed to write progress checkpoint: {:#}", e);
    }
}
