//! search_code tool implementation

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{DEFAULT_SEARCH_LIMIT, DEFAULT_SEARCH_LIMIT_CAP};
use crate::engine::ContextEngine;
use crate::search::{SearchRequest, SearchResponse};

use super::{required_arg, ToolDef, ToolResult};

pub static SEARCH_CODE_TOOL: ToolDef = ToolDef {
    name: "search_code",
    description: r#"Search an indexed codebase using a natural language query.

Returns the most relevant code chunks with their file location, line range, language and similarity rank. The codebase must have been indexed with index_codebase first. Searching while indexing is still running is allowed; the response says so and results may be incomplete.

Use extensionFilter to restrict results to files with specific extensions, e.g. [".ts", ".py"]."#,
    input_schema: search_schema,
};

fn search_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": "Absolute path to the indexed codebase directory"
            },
            "query": {
                "type": "string",
                "description": "Natural language description of the code you are looking for"
            },
            "limit": {
                "type": "number",
                "description": format!("Maximum number of results to return (max {})", DEFAULT_SEARCH_LIMIT_CAP),
                "default": DEFAULT_SEARCH_LIMIT,
                "maximum": DEFAULT_SEARCH_LIMIT_CAP
            },
            "extensionFilter": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Only return results from files with these extensions, e.g. [\".ts\", \".py\"]",
                "default": []
            }
        },
        "required": ["path", "query"]
    })
}

/// Tool arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCodeArgs {
    pub path: Option<String>,
    pub query: Option<String>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub extension_filter: Vec<String>,
}

pub struct SearchCodeTool {
    engine: Arc<ContextEngine>,
}

impl SearchCodeTool {
    pub fn new(engine: Arc<ContextEngine>) -> Self {
        Self { engine }
    }

    pub async fn execute(&self, args: SearchCodeArgs) -> ToolResult {
        let path = match required_arg(&args.path, "path") {
            Ok(p) => p,
            Err(result) => return result,
        };
        let query = match required_arg(&args.query, "query") {
            Ok(q) => q,
            Err(result) => return result,
        };

        let request = SearchRequest {
            path,
            query,
            limit: args.limit,
            extension_filter: args.extension_filter,
        };

        match self.engine.gateway().search(request).await {
            Ok(response) => ToolResult::ok(render_response(&response)),
            Err(e) => e.into(),
        }
    }
}

/// Format a search response for the client
pub fn render_response(response: &SearchResponse) -> String {
    let mut text = if response.results.is_empty() {
        format!(
            "No results found for query: \"{}\" in codebase '{}'",
            response.query, response.path
        )
    } else {
        let mut out = format!(
            "Found {} results for query: \"{}\" in codebase '{}'\n",
            response.results.len(),
            response.query,
            response.path
        );
        for item in &response.results {
            out.push_str(&format!(
                "\n{}. Code snippet ({})\n   Location: {}\n   Score: {:.3}\n   Context:\n```{}\n{}{}\n```\n",
                item.rank,
                item.language,
                item.location(),
                item.score,
                item.language,
                item.preview,
                if item.truncated { "\n..." } else { "" }
            ));
        }
        out
    };

    if let Some(percentage) = response.indexing_percentage {
        text.push_str(&format!(
            "\n\nNote: indexing is still in progress ({}% complete). Results may be incomplete.",
            percentage
        ));
    }
    text
}
