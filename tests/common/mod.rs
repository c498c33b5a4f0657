//! Shared fixtures: an in-memory vector service and engine builders

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::Semaphore;

use context_index::config::{Config, ConfigOptions};
use context_index::engine::ContextEngine;
use context_index::snapshot::{IndexCompletion, IndexStatus, SnapshotStore};
use context_index::utils::path::to_forward_slashes;
use context_index::vector::{
    IndexOutcome, IndexProgress, IndexingOptions, ProgressCallback, QueryRow, SemanticSearchHit,
    VectorIndexService,
};

/// How the next `index_codebase` call behaves
#[derive(Debug, Clone)]
pub enum IndexBehavior {
    Succeed {
        files: usize,
        chunks: usize,
        status: IndexCompletion,
    },
    Fail {
        at: u8,
        message: String,
    },
    Panic,
}

/// Arguments of the last semantic search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCall {
    pub limit: usize,
    pub min_score: f32,
    pub filter: Option<String>,
}

pub struct MockVectorService {
    /// Ordered log of service calls, e.g. `index:/p`, `clear:/p`, `limit`
    pub events: Mutex<Vec<String>>,
    pub index_calls: AtomicUsize,
    pub capacity: AtomicBool,
    pub list_fails: AtomicBool,
    pub clear_fails: AtomicBool,
    /// Collection name -> codebasePath recorded in its metadata
    pub collections: Mutex<BTreeMap<String, Option<String>>>,
    /// Collections whose `query` call fails
    pub query_fails: Mutex<BTreeSet<String>>,
    pub behavior: Mutex<IndexBehavior>,
    /// When set, indexing reports `hold_at` percent and waits for `release()`
    pub hold: AtomicBool,
    pub hold_at: Mutex<u8>,
    gate: Semaphore,
    pub hits: Mutex<Vec<SemanticSearchHit>>,
    pub last_search: Mutex<Option<SearchCall>>,
    /// Status of the cleared path at the moment `clear_index` ran
    pub status_at_clear: Mutex<Vec<IndexStatus>>,
    observed_store: OnceLock<Arc<SnapshotStore>>,
}

impl MockVectorService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            index_calls: AtomicUsize::new(0),
            capacity: AtomicBool::new(true),
            list_fails: AtomicBool::new(false),
            clear_fails: AtomicBool::new(false),
            collections: Mutex::new(BTreeMap::new()),
            query_fails: Mutex::new(BTreeSet::new()),
            behavior: Mutex::new(IndexBehavior::Succeed {
                files: 42,
                chunks: 310,
                status: IndexCompletion::Completed,
            }),
            hold: AtomicBool::new(false),
            hold_at: Mutex::new(25),
            gate: Semaphore::new(0),
            hits: Mutex::new(Vec::new()),
            last_search: Mutex::new(None),
            status_at_clear: Mutex::new(Vec::new()),
            observed_store: OnceLock::new(),
        })
    }

    pub fn set_behavior(&self, behavior: IndexBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Make indexing pause at `percentage` until `release` is called
    pub fn hold_at(&self, percentage: u8) {
        *self.hold_at.lock().unwrap() = percentage;
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.gate.add_permits(1);
    }

    pub fn observe(&self, store: Arc<SnapshotStore>) {
        let _ = self.observed_store.set(store);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn index_calls(&self) -> usize {
        self.index_calls.load(Ordering::SeqCst)
    }

    /// Pretend a collection exists remotely for `codebase`
    pub fn add_remote(&self, codebase: &str) {
        let name = self.collection_name(Path::new(codebase));
        self.collections
            .lock()
            .unwrap()
            .insert(name, Some(codebase.to_string()));
    }

    /// Make querying the collection of `codebase` fail
    pub fn fail_query_for(&self, codebase: &str) {
        let name = self.collection_name(Path::new(codebase));
        self.query_fails.lock().unwrap().insert(name);
    }

    pub fn remove_remote(&self, codebase: &str) {
        let name = self.collection_name(Path::new(codebase));
        self.collections.lock().unwrap().remove(&name);
    }

    fn log(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl VectorIndexService for MockVectorService {
    async fn index_codebase(
        &self,
        codebase_path: &Path,
        _options: &IndexingOptions,
        on_progress: ProgressCallback,
    ) -> Result<IndexOutcome> {
        let path = to_forward_slashes(codebase_path);
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        self.log(format!("index:{}", path));

        on_progress(IndexProgress::new("Preparing", 0, 0, 0));

        if self.hold.load(Ordering::SeqCst) {
            let at = *self.hold_at.lock().unwrap();
            on_progress(IndexProgress::new("Indexing files", 1, 4, at));
            let permit = self.gate.acquire().await.map_err(|e| anyhow!("{}", e))?;
            permit.forget();
        }

        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            IndexBehavior::Succeed {
                files,
                chunks,
                status,
            } => {
                on_progress(IndexProgress::new("Indexing files", files, files, 100));
                self.add_remote(&path);
                Ok(IndexOutcome {
                    indexed_files: files,
                    total_chunks: chunks,
                    status,
                })
            }
            IndexBehavior::Fail { at, message } => {
                on_progress(IndexProgress::new("Indexing files", 1, 3, at));
                Err(anyhow!(message))
            }
            IndexBehavior::Panic => panic!("embedding worker crashed"),
        }
    }

    async fn semantic_search(
        &self,
        codebase_path: &Path,
        query: &str,
        limit: usize,
        min_score: f32,
        filter: Option<&str>,
    ) -> Result<Vec<SemanticSearchHit>> {
        self.log(format!(
            "search:{}:{}",
            to_forward_slashes(codebase_path),
            query
        ));
        *self.last_search.lock().unwrap() = Some(SearchCall {
            limit,
            min_score,
            filter: filter.map(str::to_string),
        });
        Ok(self.hits.lock().unwrap().clone())
    }

    async fn clear_index(&self, codebase_path: &Path) -> Result<()> {
        let path = to_forward_slashes(codebase_path);
        self.log(format!("clear:{}", path));
        if let Some(store) = self.observed_store.get() {
            self.status_at_clear.lock().unwrap().push(store.status(&path));
        }
        if self.clear_fails.load(Ordering::SeqCst) {
            return Err(anyhow!("drop collection failed"));
        }
        self.remove_remote(&path);
        Ok(())
    }

    async fn has_index(&self, codebase_path: &Path) -> Result<bool> {
        let name = self.collection_name(codebase_path);
        Ok(self.collections.lock().unwrap().contains_key(&name))
    }

    async fn check_collection_limit(&self) -> Result<bool> {
        self.log("limit".to_string());
        Ok(self.capacity.load(Ordering::SeqCst))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.collections.lock().unwrap().keys().cloned().collect())
    }

    async fn query(
        &self,
        collection: &str,
        _filter: &str,
        _output_fields: &[&str],
        _limit: usize,
    ) -> Result<Vec<QueryRow>> {
        if self.query_fails.lock().unwrap().contains(collection) {
            return Err(anyhow!("query on {} timed out", collection));
        }
        let collections = self.collections.lock().unwrap();
        let Some(entry) = collections.get(collection) else {
            return Err(anyhow!("collection {} not found", collection));
        };
        Ok(entry
            .iter()
            .map(|path| {
                let mut row = QueryRow::new();
                row.insert(
                    "metadata".to_string(),
                    json!(json!({ "codebasePath": path }).to_string()),
                );
                row
            })
            .collect())
    }
}

pub fn test_config(snapshot_dir: &TempDir) -> Arc<Config> {
    Config::new(
        "https://vector.example.com".to_string(),
        "test-token".to_string(),
        ConfigOptions {
            snapshot_path: Some(snapshot_dir.path().join("snapshot.json")),
            checkpoint_interval_ms: Some(50),
            ..Default::default()
        },
    )
    .unwrap()
}

/// Engine over a fresh mock, with the mock observing the engine's store
pub fn open_engine(state_dir: &TempDir) -> (Arc<ContextEngine>, Arc<MockVectorService>) {
    let mock = MockVectorService::new();
    let engine = open_engine_with(state_dir, mock.clone());
    (engine, mock)
}

pub fn open_engine_with(
    state_dir: &TempDir,
    mock: Arc<MockVectorService>,
) -> Arc<ContextEngine> {
    let service: Arc<dyn VectorIndexService> = mock.clone();
    let engine = Arc::new(ContextEngine::open(test_config(state_dir), service));
    mock.observe(engine.store().clone());
    engine
}

/// A codebase directory with a couple of source files; returns its snapshot key
pub fn create_codebase() -> (TempDir, String) {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();
    std::fs::write(dir.path().join("lib.py"), "def f():\n    return 1\n").unwrap();
    let key = context_index::utils::path::canonical_key(&dir.path().to_string_lossy());
    (dir, key)
}

/// Poll until `check` holds or the timeout expires
pub async fn wait_until<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

pub fn hit(path: &str, start: usize, end: usize, score: f32) -> SemanticSearchHit {
    SemanticSearchHit {
        relative_path: path.to_string(),
        start_line: start,
        end_line: end,
        content: format!("// {}:{}\nfn example() {{}}", path, start),
        language: "rust".to_string(),
        score,
    }
}
