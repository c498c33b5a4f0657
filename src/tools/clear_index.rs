//! clear_index tool implementation

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::ContextEngine;
use crate::snapshot::IndexStatus;

use super::index_codebase::path_only_schema;
use super::{required_arg, ToolDef, ToolResult};

pub static CLEAR_INDEX_TOOL: ToolDef = ToolDef {
    name: "clear_index",
    description: "Clear the search index of a codebase. Fails while the codebase is still being indexed.",
    input_schema: path_only_schema,
};

/// Tool arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClearIndexArgs {
    pub path: Option<String>,
}

pub struct ClearIndexTool {
    engine: Arc<ContextEngine>,
}

impl ClearIndexTool {
    pub fn new(engine: Arc<ContextEngine>) -> Self {
        Self { engine }
    }

    pub async fn execute(&self, args: ClearIndexArgs) -> ToolResult {
        let path = match required_arg(&args.path, "path") {
            Ok(p) => p,
            Err(result) => return result,
        };

        match self.engine.manager().clear_index(&path).await {
            Ok(outcome) => {
                let mut text = format!("Successfully cleared codebase '{}'", outcome.path);
                if outcome.previous.status() == IndexStatus::IndexFailed {
                    text.push_str(" (the previous indexing attempt had failed)");
                }

                let remaining = self
                    .engine
                    .store()
                    .entries()
                    .iter()
                    .filter(|(_, record)| record.status() == IndexStatus::Indexed)
                    .count();
                if remaining > 0 {
                    text.push_str(&format!(
                        "\n{} other codebase(s) remain indexed",
                        remaining
                    ));
                }
                ToolResult::ok(text)
            }
            Err(e) => e.into(),
        }
    }
}
