//! Registry of background indexing tasks, keyed by codebase path

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use tokio::sync::watch;
use tokio::task::AbortHandle;

struct TaskEntry {
    abort: AbortHandle,
    /// Flips to true when the task body returns; the sender is dropped if it is aborted or panics
    done: watch::Receiver<bool>,
}

impl TaskEntry {
    fn is_live(&self) -> bool {
        !*self.done.borrow() && self.done.has_changed().is_ok()
    }
}

/// Tracks one task per path so callers can check liveness, await or abort it
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, TaskEntry>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` on the runtime and register it under `key`, replacing any finished entry
    pub fn spawn<F>(&self, key: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (done_tx, done_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            task.await;
            let _ = done_tx.send(true);
        });

        self.lock().insert(
            key.to_string(),
            TaskEntry {
                abort: handle.abort_handle(),
                done: done_rx,
            },
        );
    }

    /// Whether a task for `key` is still running
    pub fn is_running(&self, key: &str) -> bool {
        self.lock().get(key).is_some_and(TaskEntry::is_live)
    }

    /// Keys with live tasks
    pub fn running(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, entry)| entry.is_live())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Wait for the task under `key` to finish. Returns false if none was registered.
    pub async fn wait(&self, key: &str) -> bool {
        let receiver = self.lock().get(key).map(|entry| entry.done.clone());
        let Some(mut done) = receiver else {
            return false;
        };

        while !*done.borrow_and_update() {
            if done.changed().await.is_err() {
                break;
            }
        }
        true
    }

    /// Abort the task under `key`. Returns true if a live task was cancelled.
    pub fn abort(&self, key: &str) -> bool {
        match self.lock().remove(key) {
            Some(entry) => {
                let was_live = entry.is_live();
                entry.abort.abort();
                was_live
            }
            None => false,
        }
    }

    /// Abort every task, returning how many were still running
    pub fn abort_all(&self) -> usize {
        let entries: Vec<TaskEntry> = self.lock().drain().map(|(_, entry)| entry).collect();
        entries
            .into_iter()
            .filter(|entry| {
                let was_live = entry.is_live();
                entry.abort.abort();
                was_live
            })
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TaskEntry>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}
