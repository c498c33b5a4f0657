//! Per-codebase index record

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a successful indexing run ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexCompletion {
    #[default]
    Completed,
    /// The chunk cap was hit; the index holds a prefix of the codebase
    LimitReached,
}

impl fmt::Display for IndexCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::LimitReached => write!(f, "limit_reached"),
        }
    }
}

/// Lifecycle status of a codebase path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexStatus {
    #[serde(rename = "not_found")]
    NotFound,
    #[serde(rename = "indexing")]
    Indexing,
    #[serde(rename = "indexed")]
    Indexed,
    #[serde(rename = "indexfailed")]
    IndexFailed,
}

impl IndexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Indexing => "indexing",
            Self::Indexed => "indexed",
            Self::IndexFailed => "indexfailed",
        }
    }

    /// Whether a search against this status may be answered
    pub fn is_searchable(&self) -> bool {
        matches!(self, Self::Indexed | Self::Indexing)
    }
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One snapshot entry. `not_found` is never stored: absence means not found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum IndexRecord {
    #[serde(rename = "indexing", rename_all = "camelCase")]
    Indexing {
        indexing_percentage: u8,
        last_updated: DateTime<Utc>,
    },
    #[serde(rename = "indexed", rename_all = "camelCase")]
    Indexed {
        indexed_files: usize,
        total_chunks: usize,
        #[serde(default)]
        index_status: IndexCompletion,
        last_updated: DateTime<Utc>,
    },
    #[serde(rename = "indexfailed", rename_all = "camelCase")]
    IndexFailed {
        error_message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_attempted_percentage: Option<u8>,
        last_updated: DateTime<Utc>,
    },
}

impl IndexRecord {
    pub fn indexing(percentage: u8) -> Self {
        Self::Indexing {
            indexing_percentage: percentage.min(100),
            last_updated: Utc::now(),
        }
    }

    pub fn indexed(indexed_files: usize, total_chunks: usize, completion: IndexCompletion) -> Self {
        Self::Indexed {
            indexed_files,
            total_chunks,
            index_status: completion,
            last_updated: Utc::now(),
        }
    }

    pub fn failed(error_message: impl Into<String>, last_attempted_percentage: Option<u8>) -> Self {
        Self::IndexFailed {
            error_message: error_message.into(),
            last_attempted_percentage: last_attempted_percentage.map(|p| p.min(100)),
            last_updated: Utc::now(),
        }
    }

    pub fn status(&self) -> IndexStatus {
        match self {
            Self::Indexing { .. } => IndexStatus::Indexing,
            Self::Indexed { .. } => IndexStatus::Indexed,
            Self::IndexFailed { .. } => IndexStatus::IndexFailed,
        }
    }

    /// Current progress while indexing, or the last observed progress of a failed run
    pub fn percentage(&self) -> Option<u8> {
        match self {
            Self::Indexing {
                indexing_percentage,
                ..
            } => Some(*indexing_percentage),
            Self::IndexFailed {
                last_attempted_percentage,
                ..
            } => *last_attempted_percentage,
            Self::Indexed { .. } => None,
        }
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        match self {
            Self::Indexing { last_updated, .. }
            | Self::Indexed { last_updated, .. }
            | Self::IndexFailed { last_updated, .. } => *last_updated,
        }
    }
}
