//! Vector index service seam
//!
//! The lifecycle manager, reconciler and search gateway only talk to the
//! remote store through [`VectorIndexService`]. [`HttpVectorService`] is the
//! production implementation; tests substitute their own.

pub mod http;
pub mod scanner;
pub mod splitter;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::snapshot::IndexCompletion;

pub use http::HttpVectorService;
pub use splitter::SplitterKind;

/// Prefix of collections holding dense code chunks
pub const CODE_COLLECTION_PREFIX: &str = "code_chunks_";

/// Prefix of collections holding hybrid (dense + sparse) code chunks
pub const HYBRID_COLLECTION_PREFIX: &str = "hybrid_code_chunks_";

/// Deterministic collection name for a codebase path
pub fn collection_name_for(codebase_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(codebase_path.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}{}", CODE_COLLECTION_PREFIX, &digest[..8])
}

/// Whether a collection name follows the code collection naming convention
pub fn is_code_collection(name: &str) -> bool {
    name.starts_with(CODE_COLLECTION_PREFIX) || name.starts_with(HYBRID_COLLECTION_PREFIX)
}

/// Progress report emitted while indexing
#[derive(Debug, Clone, PartialEq)]
pub struct IndexProgress {
    pub phase: String,
    pub current: usize,
    pub total: usize,
    pub percentage: u8,
}

impl IndexProgress {
    pub fn new(phase: impl Into<String>, current: usize, total: usize, percentage: u8) -> Self {
        Self {
            phase: phase.into(),
            current,
            total,
            percentage: percentage.min(100),
        }
    }
}

/// Callback invoked with every progress report
pub type ProgressCallback = Arc<dyn Fn(IndexProgress) + Send + Sync>;

/// Per-run indexing options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexingOptions {
    pub splitter: SplitterKind,
    /// Extra file extensions to include, each starting with `.`
    pub custom_extensions: Vec<String>,
    /// Extra glob patterns to exclude
    pub ignore_patterns: Vec<String>,
}

/// Result of a completed indexing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexOutcome {
    pub indexed_files: usize,
    pub total_chunks: usize,
    pub status: IndexCompletion,
}

/// One ranked hit from a semantic search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticSearchHit {
    pub relative_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub language: String,
    pub score: f32,
}

/// A row returned by a scalar query, keyed by output field
pub type QueryRow = serde_json::Map<String, serde_json::Value>;

/// Operations the lifecycle subsystem needs from the vector store
#[async_trait]
pub trait VectorIndexService: Send + Sync {
    /// Index every eligible file under `codebase_path`
    async fn index_codebase(
        &self,
        codebase_path: &Path,
        options: &IndexingOptions,
        on_progress: ProgressCallback,
    ) -> Result<IndexOutcome>;

    async fn semantic_search(
        &self,
        codebase_path: &Path,
        query: &str,
        limit: usize,
        min_score: f32,
        filter: Option<&str>,
    ) -> Result<Vec<SemanticSearchHit>>;

    /// Drop the collection backing `codebase_path` (no-op when absent)
    async fn clear_index(&self, codebase_path: &Path) -> Result<()>;

    async fn has_index(&self, codebase_path: &Path) -> Result<bool>;

    /// Whether the store can accept one more collection
    async fn check_collection_limit(&self) -> Result<bool>;

    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn query(
        &self,
        collection: &str,
        filter: &str,
        output_fields: &[&str],
        limit: usize,
    ) -> Result<Vec<QueryRow>>;

    fn collection_name(&self, codebase_path: &Path) -> String {
        collection_name_for(&crate::utils::path::to_forward_slashes(codebase_path))
    }
}

/// Error for unknown splitter names
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported splitter '{0}', expected one of: {names}", names = SplitterKind::NAMES.join(", "))]
pub struct UnknownSplitter(pub String);

impl FromStr for SplitterKind {
    type Err = UnknownSplitter;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ast" => Ok(Self::Ast),
            "langchain" => Ok(Self::Langchain),
            _ => Err(UnknownSplitter(s.to_string())),
        }
    }
}
