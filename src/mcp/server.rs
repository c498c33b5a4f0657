//! MCP server: JSON-RPC dispatch onto the context engine tools

use std::sync::Arc;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::BufReader;
use tracing::{debug, error, info};

use crate::engine::ContextEngine;
use crate::tools::clear_index::{ClearIndexArgs, CLEAR_INDEX_TOOL};
use crate::tools::get_indexing_status::{GetIndexingStatusArgs, GET_INDEXING_STATUS_TOOL};
use crate::tools::index_codebase::{IndexCodebaseArgs, INDEX_CODEBASE_TOOL};
use crate::tools::search_code::{SearchCodeArgs, SEARCH_CODE_TOOL};
use crate::tools::{
    ClearIndexTool, GetIndexingStatusTool, IndexCodebaseTool, SearchCodeTool, ToolDef, ToolResult,
};

use super::transport::{read_message, write_message, TransportMode};
use super::types::*;

/// Protocol version reported on initialize
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Every tool the server exposes
pub static TOOLS: [&ToolDef; 4] = [
    &INDEX_CODEBASE_TOOL,
    &SEARCH_CODE_TOOL,
    &CLEAR_INDEX_TOOL,
    &GET_INDEXING_STATUS_TOOL,
];

/// Parse tool arguments, treating absent arguments as an empty object
pub fn parse_tool_args<T: DeserializeOwned + Default>(
    arguments: Option<Value>,
) -> std::result::Result<T, String> {
    match arguments {
        Some(Value::Null) | None => Ok(T::default()),
        Some(args) => serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e)),
    }
}

/// MCP Server
pub struct McpServer {
    engine: Arc<ContextEngine>,
    transport_mode: Option<TransportMode>,
}

impl McpServer {
    pub fn new(engine: Arc<ContextEngine>, transport_mode: Option<TransportMode>) -> Self {
        Self {
            engine,
            transport_mode,
        }
    }

    /// Run the MCP server (stdio transport) until stdin closes
    pub async fn run(&self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut transport_mode = self.transport_mode;

        info!("MCP server started, waiting for requests...");

        loop {
            let message = match read_message(&mut reader, &mut transport_mode).await {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read message: {}", e);
                    continue;
                }
            };

            if message.is_empty() {
                continue;
            }

            debug!("Received: {}", message);

            let response = match serde_json::from_str::<JsonRpcRequest>(&message) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    error!("Failed to parse request: {}", e);
                    Some(JsonRpcResponse::error(
                        None,
                        -32700,
                        format!("Parse error: {}", e),
                    ))
                }
            };

            if let Some(resp) = response {
                let resp_json = serde_json::to_string(&resp)?;
                debug!("Sending: {}", resp_json);
                let mode = transport_mode.unwrap_or(TransportMode::Line);
                write_message(&mut stdout, mode, &resp_json).await?;
            }
        }

        info!("stdin closed, MCP server stopping");
        Ok(())
    }

    /// Handle a JSON-RPC request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        // Requests without an id are notifications and never get a response
        if request.id.is_none() {
            debug!("Received notification: {}", request.method);
            return None;
        }

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(request.id)),
            "tools/list" => Some(self.handle_list_tools(request.id)),
            "tools/call" => Some(self.handle_call_tool(request.id, request.params).await),
            "ping" => Some(JsonRpcResponse::success(request.id, json!({}))),
            _ => Some(JsonRpcResponse::error(
                request.id,
                -32601,
                format!("Method not found: {}", request.method),
            )),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {}),
                logging: None,
            },
            server_info: ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e)),
        }
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools = TOOLS
            .iter()
            .map(|def| Tool {
                name: def.name.to_string(),
                description: def.description.to_string(),
                input_schema: def.get_input_schema(),
            })
            .collect();

        match serde_json::to_value(ListToolsResult { tools }) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e)),
        }
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params = match params {
            Some(p) => p,
            None => {
                return JsonRpcResponse::error(id, -32602, "Missing params".to_string());
            }
        };

        let call_params: CallToolParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(id, -32602, format!("Invalid params: {}", e));
            }
        };

        let engine = self.engine.clone();
        let arguments = call_params.arguments;
        let outcome = match call_params.name.as_str() {
            "index_codebase" => match parse_tool_args::<IndexCodebaseArgs>(arguments) {
                Ok(args) => Ok(IndexCodebaseTool::new(engine).execute(args).await),
                Err(e) => Err(e),
            },
            "search_code" => match parse_tool_args::<SearchCodeArgs>(arguments) {
                Ok(args) => Ok(SearchCodeTool::new(engine).execute(args).await),
                Err(e) => Err(e),
            },
            "clear_index" => match parse_tool_args::<ClearIndexArgs>(arguments) {
                Ok(args) => Ok(ClearIndexTool::new(engine).execute(args).await),
                Err(e) => Err(e),
            },
            "get_indexing_status" => match parse_tool_args::<GetIndexingStatusArgs>(arguments) {
                Ok(args) => Ok(GetIndexingStatusTool::new(engine).execute(args).await),
                Err(e) => Err(e),
            },
            _ => {
                return JsonRpcResponse::error(
                    id,
                    -32602,
                    format!("Unknown tool: {}", call_params.name),
                )
            }
        };

        match outcome {
            Ok(result) => tool_response(id, result),
            Err(message) => JsonRpcResponse::error(id, -32602, message),
        }
    }
}

fn tool_response(id: Option<Value>, result: ToolResult) -> JsonRpcResponse {
    let call_result = CallToolResult {
        content: vec![TextContent::new(result.text)],
        is_error: result.is_error,
    };

    match serde_json::to_value(call_result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e)),
    }
}
