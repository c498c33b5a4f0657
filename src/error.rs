//! Failure taxonomy shared by the lifecycle manager, search gateway and tools

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

/// Every failure a public lifecycle or search operation can report.
///
/// Each variant names the codebase path it concerns so callers can tell
/// which request failed without extra context.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("Invalid request for '{path}': {message}")]
    Validation { path: String, message: String },

    #[error("Codebase '{path}' is already being indexed in the background (progress: {percentage}%). Please wait for it to complete before starting again.")]
    AlreadyIndexing { path: String, percentage: u8 },

    #[error("Codebase '{path}' is still being indexed (progress: {percentage}%). Wait for indexing to finish or cancel it before clearing.")]
    ClearWhileIndexing { path: String, percentage: u8 },

    #[error("Codebase '{path}' is already indexed. Use force=true to re-index it.")]
    AlreadyIndexed { path: String },

    #[error("Cannot index '{path}': the vector store has reached its collection limit. Remove an existing index or upgrade the vector store plan; retrying will not help.")]
    CapacityExceeded { path: String },

    #[error("Codebase '{path}' is not indexed. Please index it first.")]
    NotIndexed { path: String },

    #[error("Codebase '{path}' has no indexing task in progress.")]
    NotIndexing { path: String },

    #[error("Vector service failure for '{path}': {message}")]
    Service { path: String, message: String },
}

impl IndexError {
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn service(path: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::Service {
            path: path.into(),
            message: format!("{:#}", err),
        }
    }

    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::AlreadyIndexing { .. } | Self::ClearWhileIndexing { .. } => {
                "concurrency_conflict"
            }
            Self::AlreadyIndexed { .. } => "already_indexed",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::NotIndexed { .. } => "not_indexed",
            Self::NotIndexing { .. } => "not_indexing",
            Self::Service { .. } => "service_error",
        }
    }

    /// Whether re-issuing the same request unchanged can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AlreadyIndexing { .. } | Self::ClearWhileIndexing { .. } | Self::Service { .. }
        )
    }

    /// Conflicts are "try later" answers rather than failures
    pub fn is_error(&self) -> bool {
        !matches!(
            self,
            Self::AlreadyIndexing { .. }
                | Self::ClearWhileIndexing { .. }
                | Self::AlreadyIndexed { .. }
        )
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Validation { path, .. }
            | Self::AlreadyIndexing { path, .. }
            | Self::ClearWhileIndexing { path, .. }
            | Self::AlreadyIndexed { path }
            | Self::CapacityExceeded { path }
            | Self::NotIndexed { path }
            | Self::NotIndexing { path }
            | Self::Service { path, .. } => path,
        }
    }
}
