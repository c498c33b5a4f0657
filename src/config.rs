//! Configuration module - CLI arguments and settings

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::utils::data_dir::default_snapshot_path;

/// Default window between two progress checkpoint writes
pub const DEFAULT_CHECKPOINT_INTERVAL_MS: u64 = 2000;

/// Hard cap applied to every search limit
pub const DEFAULT_SEARCH_LIMIT_CAP: usize = 50;

/// Limit used when a search request does not name one
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Minimum similarity score forwarded to the vector store
pub const DEFAULT_MIN_SCORE: f32 = 0.3;

/// Maximum number of characters kept in a search result preview
pub const DEFAULT_PREVIEW_CHARS: usize = 5000;

/// Chunk cap per codebase; reaching it ends indexing with `limit_reached`
pub const DEFAULT_MAX_CHUNKS: usize = 450_000;

/// Number of rows sent per insert request
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 100;

/// Optional configuration parameters for Config::new()
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub snapshot_path: Option<PathBuf>,
    pub checkpoint_interval_ms: Option<u64>,
    pub search_limit_cap: Option<usize>,
    pub min_score: Option<f32>,
    pub preview_chars: Option<usize>,
    pub max_chunks: Option<usize>,
    pub insert_batch_size: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub upload_concurrency: Option<usize>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub token: String,
    pub snapshot_path: PathBuf,
    pub checkpoint_interval: Duration,
    pub search_limit_cap: usize,
    pub min_score: f32,
    pub preview_chars: usize,
    pub max_chunks: usize,
    pub insert_batch_size: usize,
    pub request_timeout_secs: u64,
    pub upload_concurrency: Option<usize>,
    pub text_extensions: HashSet<String>,
    pub text_filenames: HashSet<String>,
    pub exclude_patterns: Vec<String>,
}

/// Upload strategy based on how many chunks a codebase produced so far
#[derive(Debug, Clone)]
pub struct UploadStrategy {
    pub concurrency: usize,
    pub timeout_ms: u64,
    pub scale_name: &'static str,
}

impl Config {
    /// Create a new Config with required base_url and token, plus optional settings
    pub fn new(base_url: String, token: String, options: ConfigOptions) -> Result<Arc<Self>> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();

        if base_url.is_empty() {
            return Err(anyhow!("base_url cannot be empty"));
        }

        // Keep an explicit scheme, default to https
        let base_url = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            base_url
        } else {
            format!("https://{}", base_url)
        };

        if token.trim().is_empty() {
            return Err(anyhow!("token cannot be empty"));
        }

        let search_limit_cap = options.search_limit_cap.unwrap_or(DEFAULT_SEARCH_LIMIT_CAP);
        if search_limit_cap == 0 {
            return Err(anyhow!("search_limit_cap must be greater than zero"));
        }

        let min_score = options.min_score.unwrap_or(DEFAULT_MIN_SCORE);
        if !(0.0..=1.0).contains(&min_score) {
            return Err(anyhow!("min_score must be within 0.0..=1.0, got {}", min_score));
        }

        Ok(Arc::new(Self {
            base_url,
            token,
            snapshot_path: options.snapshot_path.unwrap_or_else(default_snapshot_path),
            checkpoint_interval: Duration::from_millis(
                options
                    .checkpoint_interval_ms
                    .unwrap_or(DEFAULT_CHECKPOINT_INTERVAL_MS),
            ),
            search_limit_cap,
            min_score,
            preview_chars: options.preview_chars.unwrap_or(DEFAULT_PREVIEW_CHARS),
            max_chunks: options.max_chunks.unwrap_or(DEFAULT_MAX_CHUNKS).max(1),
            insert_batch_size: options
                .insert_batch_size
                .unwrap_or(DEFAULT_INSERT_BATCH_SIZE)
                .max(1),
            request_timeout_secs: options.request_timeout_secs.unwrap_or(60),
            upload_concurrency: options.upload_concurrency,
            text_extensions: default_text_extensions(),
            text_filenames: default_text_filenames(),
            exclude_patterns: default_exclude_patterns(),
        }))
    }

    /// Effective upload strategy, honouring a CLI concurrency override
    pub fn upload_strategy(&self, chunk_count: usize) -> UploadStrategy {
        let mut strategy = get_upload_strategy(chunk_count);
        if let Some(concurrency) = self.upload_concurrency {
            strategy.concurrency = concurrency.max(1);
        }
        strategy
    }
}

/// Get upload strategy based on chunk count
pub fn get_upload_strategy(chunk_count: usize) -> UploadStrategy {
    if chunk_count < 1_000 {
        UploadStrategy {
            concurrency: 1,
            timeout_ms: 30_000,
            scale_name: "small",
        }
    } else if chunk_count < 10_000 {
        UploadStrategy {
            concurrency: 2,
            timeout_ms: 45_000,
            scale_name: "medium",
        }
    } else if chunk_count < 100_000 {
        UploadStrategy {
            concurrency: 3,
            timeout_ms: 60_000,
            scale_name: "large",
        }
    } else {
        UploadStrategy {
            concurrency: 4,
            timeout_ms: 90_000,
            scale_name: "extra-large",
        }
    }
}

/// Default supported source file extensions
fn default_text_extensions() -> HashSet<String> {
    [
        // Programming languages
        ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".py", ".java", ".kt", ".kts", ".scala",
        ".go", ".rs", ".c", ".h", ".cpp", ".cc", ".hpp", ".cs", ".php", ".rb", ".swift", ".m",
        ".mm", ".lua", ".dart", ".ex", ".exs", ".erl", ".hs", ".zig", ".sol", ".sh", ".sql",
        // Web
        ".vue", ".svelte", ".html", ".css", ".scss",
        // Documentation and notebooks
        ".md", ".markdown", ".rst", ".ipynb",
        // Data and config
        ".json", ".yaml", ".yml", ".toml", ".proto", ".graphql",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Default exclude patterns (matched per path component and against the full relative path)
fn default_exclude_patterns() -> Vec<String> {
    [
        // Dependencies and virtual environments
        "node_modules", "vendor", ".venv", "venv", "bower_components",
        // Version control
        ".git", ".svn", ".hg",
        // Build output
        "dist", "build", "out", "target", ".next", ".nuxt", ".turbo", ".cache",
        // Caches and coverage
        "__pycache__", ".pytest_cache", ".mypy_cache", "coverage", ".nyc_output",
        // IDE
        ".idea", ".vscode", "*.swp", "*.swo",
        // Logs and temp
        "logs", "tmp", "temp", "*.log",
        // Environment files
        ".env", ".env.*", "*.local",
        // Minified and bundled assets
        "*.min.js", "*.min.css", "*.bundle.js", "*.chunk.js", "*.map",
        // Lock files
        "package-lock.json", "yarn.lock", "pnpm-lock.yaml", "Cargo.lock", "poetry.lock",
        // Data directory
        ".context",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Default known text filenames (without extension)
fn default_text_filenames() -> HashSet<String> {
    [
        "Makefile", "Dockerfile", "Jenkinsfile", "Rakefile", "Gemfile", "README", "CHANGELOG",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
