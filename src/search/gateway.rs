//! Search gateway
//!
//! Resolves the target path, checks that it is searchable, clamps the limit
//! and turns vector hits into ranked, truncated results.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{Config, DEFAULT_SEARCH_LIMIT};
use crate::error::{IndexError, Result};
use crate::index::validation::{resolve_codebase_path, validate_extensions};
use crate::index::CloudReconciler;
use crate::snapshot::{IndexRecord, SnapshotStore};
use crate::vector::{SemanticSearchHit, VectorIndexService};

/// A semantic search request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub path: String,
    pub query: String,
    pub limit: Option<usize>,
    /// Only return chunks whose file extension is in this list
    pub extension_filter: Vec<String>,
}

impl SearchRequest {
    pub fn new(path: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One ranked result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResultItem {
    /// 1-based rank
    pub rank: usize,
    pub relative_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub language: String,
    pub score: f32,
    pub preview: String,
    pub truncated: bool,
}

impl SearchResultItem {
    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.relative_path, self.start_line, self.end_line)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub path: String,
    pub query: String,
    pub results: Vec<SearchResultItem>,
    /// Set while the index is still being built; results may be incomplete
    pub indexing_percentage: Option<u8>,
}

impl SearchResponse {
    pub fn is_incomplete(&self) -> bool {
        self.indexing_percentage.is_some()
    }
}

pub struct SearchGateway {
    config: Arc<Config>,
    service: Arc<dyn VectorIndexService>,
    store: Arc<SnapshotStore>,
    reconciler: Arc<CloudReconciler>,
}

impl SearchGateway {
    pub fn new(
        config: Arc<Config>,
        service: Arc<dyn VectorIndexService>,
        store: Arc<SnapshotStore>,
        reconciler: Arc<CloudReconciler>,
    ) -> Self {
        Self {
            config,
            service,
            store,
            reconciler,
        }
    }

    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let key = resolve_codebase_path(&request.path)?;

        let query = request.query.trim();
        if query.is_empty() {
            return Err(IndexError::validation(&key, "query must not be empty"));
        }
        let extensions = validate_extensions(&key, &request.extension_filter)?;

        self.reconciler.reconcile().await;

        let indexing_percentage = match self.store.get(&key) {
            Some(IndexRecord::Indexed { .. }) => None,
            Some(IndexRecord::Indexing {
                indexing_percentage,
                ..
            }) => Some(indexing_percentage),
            _ => return Err(IndexError::NotIndexed { path: key }),
        };

        let limit = self.effective_limit(request.limit);
        let filter = build_extension_filter(&extensions);
        debug!(
            "Searching {} for '{}' (limit {}, filter {:?})",
            key, query, limit, filter
        );

        let hits = self
            .service
            .semantic_search(
                Path::new(&key),
                query,
                limit,
                self.config.min_score,
                filter.as_deref(),
            )
            .await
            .map_err(|e| IndexError::service(&key, &e))?;

        let results = hits
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, hit)| self.to_item(i + 1, hit))
            .collect::<Vec<_>>();

        info!("Search in {} returned {} results", key, results.len());

        Ok(SearchResponse {
            path: key,
            query: query.to_string(),
            results,
            indexing_percentage,
        })
    }

    /// Requested limit clamped to `1..=search_limit_cap`
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, self.config.search_limit_cap)
    }

    fn to_item(&self, rank: usize, hit: SemanticSearchHit) -> SearchResultItem {
        let (preview, truncated) = truncate_preview(&hit.content, self.config.preview_chars);
        SearchResultItem {
            rank,
            relative_path: hit.relative_path,
            start_line: hit.start_line,
            end_line: hit.end_line,
            language: hit.language,
            score: hit.score,
            preview,
            truncated,
        }
    }
}

/// Filter expression restricting results to the given extensions
pub fn build_extension_filter(extensions: &[String]) -> Option<String> {
    if extensions.is_empty() {
        return None;
    }
    let quoted: Vec<String> = extensions.iter().map(|e| format!("\"{}\"", e)).collect();
    Some(format!("fileExtension in [{}]", quoted.join(", ")))
}

/// Cut content to at most `max_chars` characters
pub fn truncate_preview(content: &str, max_chars: usize) -> (String, bool) {
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => (content[..end].to_string(), true),
        None => (content.to_string(), false),
    }
}
