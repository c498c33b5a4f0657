//! get_indexing_status tool implementation

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::ContextEngine;
use crate::index::IndexStatusReport;
use crate::snapshot::{IndexCompletion, IndexRecord};

use super::index_codebase::path_only_schema;
use super::{required_arg, ToolDef, ToolResult};

pub static GET_INDEXING_STATUS_TOOL: ToolDef = ToolDef {
    name: "get_indexing_status",
    description: "Get the indexing status of a codebase: progress while indexing, statistics once indexed, or the error of a failed attempt.",
    input_schema: path_only_schema,
};

/// Tool arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetIndexingStatusArgs {
    pub path: Option<String>,
}

pub struct GetIndexingStatusTool {
    engine: Arc<ContextEngine>,
}

impl GetIndexingStatusTool {
    pub fn new(engine: Arc<ContextEngine>) -> Self {
        Self { engine }
    }

    pub async fn execute(&self, args: GetIndexingStatusArgs) -> ToolResult {
        let path = match required_arg(&args.path, "path") {
            Ok(p) => p,
            Err(result) => return result,
        };

        match self.engine.manager().get_status(&path) {
            Ok(report) => ToolResult::ok(render_status(&report)),
            Err(e) => e.into(),
        }
    }
}

/// Format a status report for the client
pub fn render_status(report: &IndexStatusReport) -> String {
    let path = &report.path;
    match &report.record {
        None => format!(
            "Codebase '{}' is not indexed. Use the index_codebase tool to index it first.",
            path
        ),
        Some(IndexRecord::Indexing {
            indexing_percentage,
            last_updated,
        }) => {
            let mut text = format!(
                "Codebase '{}' is currently being indexed. Progress: {}%\nLast updated: {}",
                path,
                indexing_percentage,
                last_updated.to_rfc3339()
            );
            if report.is_interrupted() {
                text.push_str(
                    "\nNo indexing task is running for it; the previous run was interrupted. Call index_codebase again to restart it.",
                );
            }
            text
        }
        Some(IndexRecord::Indexed {
            indexed_files,
            total_chunks,
            index_status,
            last_updated,
        }) => {
            let mut text = format!(
                "Codebase '{}' is fully indexed and ready for search.\nStatistics: {} files, {} chunks\nStatus: {}\nLast updated: {}",
                path,
                indexed_files,
                total_chunks,
                index_status,
                last_updated.to_rfc3339()
            );
            if *index_status == IndexCompletion::LimitReached {
                text.push_str(
                    "\nIndexing stopped at the chunk limit; some files are not searchable.",
                );
            }
            text
        }
        Some(IndexRecord::IndexFailed {
            error_message,
            last_attempted_percentage,
            last_updated,
        }) => {
            let mut text = format!(
                "Codebase '{}' indexing failed.\nError: {}",
                path, error_message
            );
            if let Some(percentage) = last_attempted_percentage {
                text.push_str(&format!("\nFailed at: {}% progress", percentage));
            }
            text.push_str(&format!(
                "\nFailed at time: {}\nYou can retry indexing by running the index_codebase tool again.",
                last_updated.to_rfc3339()
            ));
            text
        }
    }
}
