//! index_codebase tool implementation

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::engine::ContextEngine;
use crate::index::IndexRequest;
use crate::vector::SplitterKind;

use super::{required_arg, ToolDef, ToolResult};

pub static INDEX_CODEBASE_TOOL: ToolDef = ToolDef {
    name: "index_codebase",
    description: r#"Index a codebase directory for semantic search.

Indexing runs in the background: this call returns as soon as the task has started. Use get_indexing_status to follow progress. search_code can be used while indexing is in progress, but results may be incomplete until it completes.

Set force=true to drop an existing index and rebuild it from scratch."#,
    input_schema: index_schema,
};

fn index_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": "Absolute path to the codebase directory to index"
            },
            "force": {
                "type": "boolean",
                "description": "Re-index even if the codebase is already indexed",
                "default": false
            },
            "splitter": {
                "type": "string",
                "description": "Code splitter: 'ast' for structure-aware splitting or 'langchain' for character windows",
                "enum": SplitterKind::NAMES,
                "default": "ast"
            },
            "customExtensions": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Additional file extensions to include, e.g. [\".vue\", \".svelte\"]",
                "default": []
            },
            "ignorePatterns": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Additional glob patterns to exclude, e.g. [\"static/**\", \"*.tmp\"]",
                "default": []
            }
        },
        "required": ["path"]
    })
}

pub(crate) fn path_only_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": "Absolute path to the codebase directory"
            }
        },
        "required": ["path"]
    })
}

/// Tool arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexCodebaseArgs {
    pub path: Option<String>,
    #[serde(default)]
    pub force: bool,
    pub splitter: Option<String>,
    #[serde(default)]
    pub custom_extensions: Vec<String>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

pub struct IndexCodebaseTool {
    engine: Arc<ContextEngine>,
}

impl IndexCodebaseTool {
    pub fn new(engine: Arc<ContextEngine>) -> Self {
        Self { engine }
    }

    pub async fn execute(&self, args: IndexCodebaseArgs) -> ToolResult {
        let path = match required_arg(&args.path, "path") {
            Ok(p) => p,
            Err(result) => return result,
        };

        let request = IndexRequest {
            path,
            force: args.force,
            splitter: args.splitter,
            custom_extensions: args.custom_extensions,
            ignore_patterns: args.ignore_patterns,
        };

        match self.engine.manager().request_index(request).await {
            Ok(started) => {
                info!("index_codebase accepted for {}", started.path);

                let mut text = format!(
                    "Started background indexing for codebase '{}' using {} splitter.",
                    started.path, started.splitter
                );
                if started.forced {
                    text.push_str(" The previous index was cleared first.");
                }
                if !started.custom_extensions.is_empty() {
                    text.push_str(&format!(
                        "\nUsing custom extensions: {}",
                        started.custom_extensions.join(", ")
                    ));
                }
                if !started.ignore_patterns.is_empty() {
                    text.push_str(&format!(
                        "\nUsing custom ignore patterns: {}",
                        started.ignore_patterns.join(", ")
                    ));
                }
                text.push_str(
                    "\n\nIndexing is running in the background. You can search the codebase while indexing is in progress, but results may be incomplete until indexing completes.",
                );
                ToolResult::ok(text)
            }
            Err(e) => e.into(),
        }
    }
}
