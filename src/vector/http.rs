//! HTTP vector store client
//!
//! Speaks a Milvus-style REST dialect (`/v2/vectordb/...`): every call is a
//! JSON `POST` answered with `{ "code": 0, "data": ... }`. Embedding happens
//! on the server, so this client only scans, splits and uploads text.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::scanner::FileScanner;
use super::splitter::language_for_extension;
use super::{
    IndexOutcome, IndexProgress, IndexingOptions, ProgressCallback, QueryRow, SemanticSearchHit,
    VectorIndexService,
};
use crate::config::Config;
use crate::http_logger::{self, HttpExchange};
use crate::snapshot::IndexCompletion;
use crate::utils::path::to_forward_slashes;

/// REST API prefix
const API_PREFIX: &str = "/v2/vectordb";

/// User-Agent header value
const USER_AGENT: &str = concat!("context-index/", env!("CARGO_PKG_VERSION"));

/// Error text the store returns when no more collections can be created
pub const COLLECTION_LIMIT_MARKER: &str = "exceeded the limit number of collections";

/// Attempts per request before giving up
const MAX_RETRIES: u32 = 3;

/// Fields read back from search and query calls
const OUTPUT_FIELDS: [&str; 6] = [
    "content",
    "relativePath",
    "startLine",
    "endLine",
    "fileExtension",
    "metadata",
];

/// Response envelope
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// Error reported by the store inside a successful HTTP response
#[derive(Debug, thiserror::Error)]
#[error("vector store error {code}: {message}")]
pub struct ApiError {
    pub code: i64,
    pub message: String,
}

/// HTTP implementation of [`VectorIndexService`]
pub struct HttpVectorService {
    config: Arc<Config>,
    client: Client,
}

impl HttpVectorService {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// POST `body` to `endpoint` and return the envelope's `data` (Null when absent).
    ///
    /// Transport errors, 429 and 5xx are retried with backoff; 400/401/403 and
    /// non-zero envelope codes fail immediately.
    async fn post(&self, endpoint: &str, body: &Value, timeout: Duration) -> Result<Value> {
        let url = format!("{}{}/{}", self.config.base_url, API_PREFIX, endpoint);
        let payload = serde_json::to_string(body)?;
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            let request_id = Uuid::new_v4().to_string();
            let started = Instant::now();
            let result = self
                .client
                .post(&url)
                .timeout(timeout)
                .header("Content-Type", "application/json")
                .header("User-Agent", USER_AGENT)
                .header("x-request-id", &request_id)
                .header("Authorization", format!("Bearer {}", self.config.token))
                .body(payload.clone())
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    let error_msg = e.to_string();
                    self.log(&url, &request_id, &payload, None, None, started, Some(&error_msg));
                    if attempt < MAX_RETRIES - 1 {
                        let wait_time = 1000 * (1 << attempt);
                        warn!(
                            "Request to {} failed (attempt {}/{}): {}, retrying in {}ms...",
                            endpoint,
                            attempt + 1,
                            MAX_RETRIES,
                            error_msg,
                            wait_time
                        );
                        tokio::time::sleep(Duration::from_millis(wait_time)).await;
                    }
                    last_error = Some(error_msg);
                    continue;
                }
            };

            let status = response.status();
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            self.log(
                &url,
                &request_id,
                &payload,
                Some(status.as_u16()),
                Some(&text),
                started,
                None,
            );

            if status == 401 {
                return Err(anyhow!("Token invalid or expired"));
            }
            if status == 403 {
                return Err(anyhow!("Access denied, token may be disabled"));
            }
            if status == 400 {
                return Err(anyhow!("Bad request: {}", text));
            }

            if status.is_success() {
                let envelope: ApiEnvelope = serde_json::from_str(&text)
                    .with_context(|| format!("Malformed response from {}", endpoint))?;
                if envelope.code != 0 {
                    return Err(ApiError {
                        code: envelope.code,
                        message: envelope.message.unwrap_or_default(),
                    }
                    .into());
                }
                return Ok(envelope.data.unwrap_or(Value::Null));
            }

            if status == 429 && attempt < MAX_RETRIES - 1 {
                let wait_time = retry_after.unwrap_or(1) * 1000;
                warn!(
                    "Rate limited (attempt {}/{}), retrying in {}ms...",
                    attempt + 1,
                    MAX_RETRIES,
                    wait_time
                );
                tokio::time::sleep(Duration::from_millis(wait_time)).await;
                last_error = Some(format!("HTTP error: {}", status));
                continue;
            }

            if status.is_server_error() && attempt < MAX_RETRIES - 1 {
                let wait_time = 1000 * (1 << attempt);
                warn!(
                    "Server error {} (attempt {}/{}), retrying in {}ms...",
                    status,
                    attempt + 1,
                    MAX_RETRIES,
                    wait_time
                );
                tokio::time::sleep(Duration::from_millis(wait_time)).await;
                last_error = Some(format!("HTTP error: {}", status));
                continue;
            }

            return Err(anyhow!("HTTP error: {} - {}", status, text));
        }

        Err(anyhow!(
            "All retries failed: {}",
            last_error.unwrap_or_default()
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn log(
        &self,
        url: &str,
        request_id: &str,
        body: &str,
        status: Option<u16>,
        response_body: Option<&str>,
        started: Instant,
        error: Option<&str>,
    ) {
        if !http_logger::is_enabled() {
            return;
        }
        http_logger::log_exchange(&HttpExchange {
            method: "POST",
            url,
            headers: vec![
                ("User-Agent".to_string(), USER_AGENT.to_string()),
                ("x-request-id".to_string(), request_id.to_string()),
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", self.config.token),
                ),
            ],
            request_body: Some(body),
            status,
            response_body,
            duration_ms: started.elapsed().as_millis() as u64,
            error,
        });
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    async fn has_collection(&self, collection: &str) -> Result<bool> {
        let data = self
            .post(
                "collections/has",
                &json!({ "collectionName": collection }),
                self.default_timeout(),
            )
            .await?;
        Ok(data.get("has").and_then(Value::as_bool).unwrap_or(false))
    }

    async fn create_collection(&self, collection: &str, description: &str) -> Result<()> {
        self.post(
            "collections/create",
            &json!({ "collectionName": collection, "description": description }),
            self.default_timeout(),
        )
        .await?;
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.post(
            "collections/drop",
            &json!({ "collectionName": collection }),
            self.default_timeout(),
        )
        .await?;
        Ok(())
    }

    async fn insert_rows(&self, collection: &str, rows: Vec<Value>, timeout: Duration) -> Result<()> {
        let count = rows.len();
        self.post(
            "entities/insert",
            &json!({ "collectionName": collection, "data": rows }),
            timeout,
        )
        .await
        .with_context(|| format!("Failed to insert {} chunks into {}", count, collection))?;
        debug!("Inserted {} chunks into {}", count, collection);
        Ok(())
    }

    /// Upload batches with bounded concurrency; the first failure aborts the run
    async fn flush_batches(
        &self,
        collection: &str,
        batches: Vec<Vec<Value>>,
        concurrency: usize,
        timeout: Duration,
    ) -> Result<()> {
        let results: Vec<Result<()>> = stream::iter(
            batches
                .into_iter()
                .map(|batch| self.insert_rows(collection, batch, timeout)),
        )
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

        results.into_iter().collect()
    }
}

/// Stable id for a chunk
pub fn chunk_id(relative_path: &str, start_line: usize, end_line: usize, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}:{}", relative_path, start_line, end_line, content).as_bytes());
    format!("chunk_{}", &hex::encode(hasher.finalize())[..16])
}

/// Indexing progress: 10% after scanning, the remaining 90% spread over files
fn file_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (10 + (89 * done) / total).min(99) as u8
}

fn parse_hit(row: &Value) -> Option<SemanticSearchHit> {
    let relative_path = row.get("relativePath")?.as_str()?.to_string();
    let metadata = row.get("metadata").and_then(|m| match m {
        Value::String(s) => serde_json::from_str::<Value>(s).ok(),
        Value::Object(_) => Some(m.clone()),
        _ => None,
    });
    let extension = row
        .get("fileExtension")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let language = metadata
        .as_ref()
        .and_then(|m| m.get("language"))
        .and_then(Value::as_str)
        .unwrap_or_else(|| language_for_extension(extension))
        .to_string();
    let score = row
        .get("score")
        .or_else(|| row.get("distance"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0) as f32;

    Some(SemanticSearchHit {
        relative_path,
        start_line: row.get("startLine").and_then(Value::as_u64).unwrap_or(0) as usize,
        end_line: row.get("endLine").and_then(Value::as_u64).unwrap_or(0) as usize,
        content: row
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        language,
        score,
    })
}

#[async_trait]
impl VectorIndexService for HttpVectorService {
    async fn index_codebase(
        &self,
        codebase_path: &Path,
        options: &IndexingOptions,
        on_progress: ProgressCallback,
    ) -> Result<IndexOutcome> {
        let codebase = to_forward_slashes(codebase_path);
        let collection = self.collection_name(codebase_path);

        on_progress(IndexProgress::new("Preparing collection", 0, 0, 0));
        if !self.has_collection(&collection).await? {
            info!("Creating collection {} for {}", collection, codebase);
            self.create_collection(&collection, &format!("codebasePath:{}", codebase))
                .await?;
        }
        on_progress(IndexProgress::new("Scanning files", 0, 0, 5));

        let scanner = FileScanner::new(
            &self.config,
            codebase_path.to_path_buf(),
            &options.custom_extensions,
            &options.ignore_patterns,
        )?;
        let files = tokio::task::spawn_blocking(move || scanner.collect_files())
            .await
            .context("File scan task failed")??;
        let total_files = files.len();
        on_progress(IndexProgress::new(
            "Scanning files",
            total_files,
            total_files,
            10,
        ));
        info!("Found {} files to index in {}", total_files, codebase);

        let (chunk_size, _) = options.splitter.default_settings();
        let estimated_chunks = files
            .iter()
            .map(|f| f.content.len() / chunk_size + 1)
            .sum::<usize>();
        let strategy = self.config.upload_strategy(estimated_chunks);
        let timeout = Duration::from_millis(strategy.timeout_ms);
        info!(
            "Project scale: {} (~{} chunks, concurrency: {})",
            strategy.scale_name, estimated_chunks, strategy.concurrency
        );

        let max_chunks = self.config.max_chunks;
        let batch_size = self.config.insert_batch_size;
        let mut total_chunks = 0usize;
        let mut indexed_files = 0usize;
        let mut completion = IndexCompletion::Completed;
        let mut batch: Vec<Value> = Vec::with_capacity(batch_size);
        let mut ready: Vec<Vec<Value>> = Vec::new();

        for (i, file) in files.iter().enumerate() {
            let language = language_for_extension(&file.extension);
            let chunks = options.splitter.split(&file.content);
            let take = chunks.len().min(max_chunks - total_chunks);

            for (chunk_index, chunk) in chunks.into_iter().take(take).enumerate() {
                let metadata = json!({
                    "codebasePath": codebase,
                    "language": language,
                    "chunkIndex": chunk_index,
                    "splitter": options.splitter.as_str(),
                });
                batch.push(json!({
                    "id": chunk_id(&file.relative_path, chunk.start_line, chunk.end_line, &chunk.content),
                    "content": chunk.content,
                    "relativePath": file.relative_path,
                    "startLine": chunk.start_line,
                    "endLine": chunk.end_line,
                    "fileExtension": file.extension,
                    "metadata": metadata.to_string(),
                }));
                if batch.len() >= batch_size {
                    ready.push(std::mem::replace(&mut batch, Vec::with_capacity(batch_size)));
                }
            }

            if take > 0 {
                indexed_files += 1;
            }
            total_chunks += take;

            if ready.len() >= strategy.concurrency {
                self.flush_batches(&collection, std::mem::take(&mut ready), strategy.concurrency, timeout)
                    .await?;
            }

            on_progress(IndexProgress::new(
                "Indexing files",
                i + 1,
                total_files,
                file_progress(i + 1, total_files),
            ));

            if total_chunks >= max_chunks {
                warn!(
                    "Chunk limit of {} reached for {}, stopping after {} files",
                    max_chunks, codebase, indexed_files
                );
                completion = IndexCompletion::LimitReached;
                break;
            }
        }

        if !batch.is_empty() {
            ready.push(batch);
        }
        if !ready.is_empty() {
            self.flush_batches(&collection, ready, strategy.concurrency, timeout)
                .await?;
        }

        on_progress(IndexProgress::new("Completed", total_files, total_files, 100));
        info!(
            "Indexed {} files ({} chunks) into {}",
            indexed_files, total_chunks, collection
        );

        Ok(IndexOutcome {
            indexed_files,
            total_chunks,
            status: completion,
        })
    }

    async fn semantic_search(
        &self,
        codebase_path: &Path,
        query: &str,
        limit: usize,
        min_score: f32,
        filter: Option<&str>,
    ) -> Result<Vec<SemanticSearchHit>> {
        let collection = self.collection_name(codebase_path);
        let mut body = json!({
            "collectionName": collection,
            "data": [query],
            "limit": limit,
            "outputFields": OUTPUT_FIELDS,
            "searchParams": { "radius": min_score },
        });
        if let Some(filter) = filter {
            body["filter"] = Value::String(filter.to_string());
        }

        let data = self
            .post("entities/search", &body, self.default_timeout())
            .await?;
        let rows = data.as_array().cloned().unwrap_or_default();

        let mut hits: Vec<SemanticSearchHit> = rows
            .iter()
            .filter_map(parse_hit)
            .filter(|hit| hit.score >= min_score)
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn clear_index(&self, codebase_path: &Path) -> Result<()> {
        let collection = self.collection_name(codebase_path);
        if self.has_collection(&collection).await? {
            self.drop_collection(&collection).await?;
            info!("Dropped collection {}", collection);
        } else {
            debug!("Collection {} already absent", collection);
        }
        Ok(())
    }

    async fn has_index(&self, codebase_path: &Path) -> Result<bool> {
        self.has_collection(&self.collection_name(codebase_path)).await
    }

    async fn check_collection_limit(&self) -> Result<bool> {
        let probe = format!("collection_limit_probe_{}", Uuid::new_v4().simple());
        match self.create_collection(&probe, "capacity probe").await {
            Ok(()) => {
                if let Err(e) = self.drop_collection(&probe).await {
                    warn!("Failed to drop capacity probe {}: {:#}", probe, e);
                }
                Ok(true)
            }
            Err(e) => match e.downcast_ref::<ApiError>() {
                Some(api) if api.message.contains(COLLECTION_LIMIT_MARKER) => Ok(false),
                _ => Err(e),
            },
        }
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let data = self
            .post("collections/list", &json!({}), self.default_timeout())
            .await?;
        Ok(data
            .as_array()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn query(
        &self,
        collection: &str,
        filter: &str,
        output_fields: &[&str],
        limit: usize,
    ) -> Result<Vec<QueryRow>> {
        let data = self
            .post(
                "entities/query",
                &json!({
                    "collectionName": collection,
                    "filter": filter,
                    "outputFields": output_fields,
                    "limit": limit,
                }),
                self.default_timeout(),
            )
            .await?;
        Ok(data
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|r| r.as_object().cloned())
                    .collect()
            })
            .unwrap_or_default())
    }
}
