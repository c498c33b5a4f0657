//! context-index - MCP server that indexes codebases into a remote vector
//! store and serves semantic code search

pub mod config;
pub mod engine;
pub mod error;
pub mod http_logger;
pub mod index;
pub mod mcp;
pub mod search;
pub mod snapshot;
pub mod tools;
pub mod utils;
pub mod vector;

// Re-export commonly used types
pub use config::{get_upload_strategy, Config, ConfigOptions, UploadStrategy};
pub use engine::ContextEngine;
pub use error::{IndexError, Result};
pub use index::{IndexLifecycleManager, IndexRequest, IndexStatusReport};
pub use search::{SearchGateway, SearchRequest, SearchResponse};
pub use snapshot::{IndexRecord, IndexStatus, SnapshotStore};
pub use vector::{HttpVectorService, VectorIndexService};
