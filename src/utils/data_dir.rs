//! Data directory resolution
//!
//! All durable state lives under `~/.context/` so that every project shares
//! one snapshot of what has been indexed.

use std::fs;
use std::path::{Path, PathBuf};

/// Name of the data directory inside the user's home directory
pub const DATA_DIR_NAME: &str = ".context";

/// Snapshot file name inside the data directory
pub const SNAPSHOT_FILE_NAME: &str = "mcp-codebase-snapshot.json";

/// Get the data directory path, creating it if it doesn't exist
///
/// Falls back to a relative `.context` directory when no home directory can be determined.
pub fn get_data_dir() -> PathBuf {
    let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    ensure_dir(&base.join(DATA_DIR_NAME))
}

/// Create `dir` if missing; failures are logged and the path is still returned
pub fn ensure_dir(dir: &Path) -> PathBuf {
    if !dir.exists() {
        if let Err(e) = fs::create_dir_all(dir) {
            tracing::warn!("Failed to create data directory {}: {}", dir.display(), e);
        }
    }
    dir.to_path_buf()
}

/// Default snapshot file path
pub fn default_snapshot_path() -> PathBuf {
    get_data_dir().join(SNAPSHOT_FILE_NAME)
}
