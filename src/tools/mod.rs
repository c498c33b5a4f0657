//! MCP tools
//!
//! Each tool parses its arguments, calls the engine and renders the typed
//! outcome as text. This is the only place results become strings.

pub mod clear_index;
pub mod get_indexing_status;
pub mod index_codebase;
pub mod search_code;

pub use clear_index::ClearIndexTool;
pub use get_indexing_status::GetIndexingStatusTool;
pub use index_codebase::IndexCodebaseTool;
pub use search_code::SearchCodeTool;

use crate::error::IndexError;

/// Tool definition for MCP
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: fn() -> serde_json::Value,
}

impl ToolDef {
    pub fn get_input_schema(&self) -> serde_json::Value {
        (self.input_schema)()
    }
}

/// Rendered tool outcome
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub text: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

impl From<IndexError> for ToolResult {
    fn from(err: IndexError) -> Self {
        let is_error = err.is_error();
        let text = if is_error {
            format!("Error: {}", err)
        } else {
            err.to_string()
        };
        Self { text, is_error }
    }
}

/// Non-empty trimmed value of a required string argument
pub(crate) fn required_arg(value: &Option<String>, name: &str) -> Result<String, ToolResult> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ToolResult::error(format!("Error: {} is required", name))),
    }
}
