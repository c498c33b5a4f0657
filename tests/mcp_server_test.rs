//! Tests for the MCP server: framing and request dispatch

mod common;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::BufReader;

use common::{create_codebase, open_engine};
use context_index::mcp::server::{parse_tool_args, PROTOCOL_VERSION};
use context_index::mcp::transport::{read_message, write_message};
use context_index::mcp::types::JsonRpcRequest;
use context_index::mcp::{
    is_header_line, parse_content_length, McpServer, TransportMode, MAX_HEADER_COUNT,
};
use context_index::tools::index_codebase::IndexCodebaseArgs;

fn request(id: Option<Value>, method: &str, params: Option<Value>) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id,
        method: method.to_string(),
        params,
    }
}

fn server(state: &TempDir) -> McpServer {
    let (engine, _mock) = open_engine(state);
    McpServer::new(engine, None)
}

#[test]
fn test_is_header_line() {
    assert!(is_header_line("Content-Length: 123"));
    assert!(is_header_line("content-length:0"));
    assert!(is_header_line("  Content-Type : application/json"));
    assert!(is_header_line("Content-Length:"));

    assert!(!is_header_line(""));
    assert!(!is_header_line("not a header"));
    assert!(!is_header_line("Authorization: Bearer token"));
    assert!(!is_header_line("{\"jsonrpc\":\"2.0\"}"));
}

#[test]
fn test_parse_content_length() {
    assert_eq!(parse_content_length("Content-Length: 123").unwrap(), Some(123));
    assert_eq!(parse_content_length("CONTENT-LENGTH:456").unwrap(), Some(456));
    assert_eq!(parse_content_length("Content-Length:  789  ").unwrap(), Some(789));
    assert_eq!(
        parse_content_length("Content-Type: application/json").unwrap(),
        None
    );
    assert_eq!(parse_content_length("no colon here").unwrap(), None);
}

#[test]
fn test_parse_content_length_invalid_number() {
    assert!(parse_content_length("Content-Length: abc").is_err());
    assert!(parse_content_length("Content-Length: -1").is_err());
    assert!(parse_content_length("Content-Length: 12.34").is_err());
}

#[test]
fn test_header_count_limit() {
    const { assert!(MAX_HEADER_COUNT >= 10) };
    const { assert!(MAX_HEADER_COUNT <= 1000) };
}

#[tokio::test]
async fn test_read_message_detects_line_mode() {
    let input = b"\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n{\"id\":2}\r\n";
    let mut reader = BufReader::new(&input[..]);
    let mut mode = None;

    let first = read_message(&mut reader, &mut mode).await.unwrap();
    assert_eq!(
        first.as_deref(),
        Some("{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}")
    );
    assert_eq!(mode, Some(TransportMode::Line));

    let second = read_message(&mut reader, &mut mode).await.unwrap();
    assert_eq!(second.as_deref(), Some("{\"id\":2}"));

    assert_eq!(read_message(&mut reader, &mut mode).await.unwrap(), None);
}

#[tokio::test]
async fn test_read_message_detects_lsp_mode() {
    let payload = "{\"method\":\"ping\",\"params\":{\"text\":\"你好\"}}";
    let input = format!(
        "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n{}Content-Length: 2\r\n\r\n{{}}",
        payload.len(),
        payload
    );
    let mut reader = BufReader::new(input.as_bytes());
    let mut mode = None;

    let first = read_message(&mut reader, &mut mode).await.unwrap();
    assert_eq!(first.as_deref(), Some(payload));
    assert_eq!(mode, Some(TransportMode::Lsp));

    let second = read_message(&mut reader, &mut mode).await.unwrap();
    assert_eq!(second.as_deref(), Some("{}"));
}

#[tokio::test]
async fn test_read_message_lsp_without_length() {
    let input = b"Content-Type: application/json\r\n\r\n{}";
    let mut reader = BufReader::new(&input[..]);
    let mut mode = Some(TransportMode::Lsp);

    let err = read_message(&mut reader, &mut mode).await.unwrap_err();
    assert!(err.to_string().contains("Missing Content-Length"));
}

#[tokio::test]
async fn test_read_message_rejects_oversized_payload() {
    let input = b"Content-Length: 20971520\r\n\r\n{}";
    let mut reader = BufReader::new(&input[..]);
    let mut mode = None;

    let err = read_message(&mut reader, &mut mode).await.unwrap_err();
    assert!(err.to_string().contains("exceeds maximum"));
}

#[tokio::test]
async fn test_write_message_framing() {
    let payload = r#"{"jsonrpc":"2.0","id":1,"result":{}}"#;

    let mut line = Vec::new();
    write_message(&mut line, TransportMode::Line, payload)
        .await
        .unwrap();
    assert_eq!(line, format!("{}\n", payload).into_bytes());

    let mut lsp = Vec::new();
    write_message(&mut lsp, TransportMode::Lsp, "你好").await.unwrap();
    assert_eq!(lsp, "Content-Length: 6\r\n\r\n你好".as_bytes());
}

#[test]
fn test_parse_tool_args() {
    let empty: IndexCodebaseArgs = parse_tool_args(None).unwrap();
    assert!(empty.path.is_none());
    assert!(!empty.force);

    let args: IndexCodebaseArgs = parse_tool_args(Some(json!({
        "path": "/repo",
        "force": true,
        "customExtensions": [".vue"],
        "ignorePatterns": ["dist/**"]
    })))
    .unwrap();
    assert_eq!(args.path.as_deref(), Some("/repo"));
    assert!(args.force);
    assert_eq!(args.custom_extensions, vec![".vue"]);
    assert_eq!(args.ignore_patterns, vec!["dist/**"]);

    let err = parse_tool_args::<IndexCodebaseArgs>(Some(json!({"force": "yes"}))).unwrap_err();
    assert!(err.starts_with("Invalid arguments"));
}

#[tokio::test]
async fn test_initialize() {
    let state = TempDir::new().unwrap();
    let server = server(&state);

    let response = server
        .handle_request(request(Some(json!(1)), "initialize", Some(json!({}))))
        .await
        .unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    assert_eq!(result["serverInfo"]["name"], "context-index");
    assert!(result["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn test_tools_list() {
    let state = TempDir::new().unwrap();
    let server = server(&state);

    let response = server
        .handle_request(request(Some(json!(2)), "tools/list", None))
        .await
        .unwrap();
    let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
    assert_eq!(tools.len(), 4);
    assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
}

#[tokio::test]
async fn test_notification_has_no_response() {
    let state = TempDir::new().unwrap();
    let server = server(&state);

    let response = server
        .handle_request(request(None, "notifications/initialized", None))
        .await;
    assert!(response.is_none());
}

#[tokio::test]
async fn test_unknown_method_and_tool() {
    let state = TempDir::new().unwrap();
    let server = server(&state);

    let response = server
        .handle_request(request(Some(json!(3)), "resources/list", None))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32601);

    let response = server
        .handle_request(request(
            Some(json!(4)),
            "tools/call",
            Some(json!({"name": "summarize_repo", "arguments": {}})),
        ))
        .await
        .unwrap();
    let error = response.error.unwrap();
    assert_eq!(error.code, -32602);
    assert!(error.message.contains("summarize_repo"));

    let response = server
        .handle_request(request(Some(json!(5)), "tools/call", None))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32602);
}

#[tokio::test]
async fn test_call_status_tool() {
    let state = TempDir::new().unwrap();
    let server = server(&state);
    let (_codebase, key) = create_codebase();

    let response = server
        .handle_request(request(
            Some(json!(6)),
            "tools/call",
            Some(json!({"name": "get_indexing_status", "arguments": {"path": key}})),
        ))
        .await
        .unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["isError"], false);
    assert_eq!(result["content"][0]["type"], "text");
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("is not indexed"));
}

#[tokio::test]
async fn test_call_tool_error_sets_is_error() {
    let state = TempDir::new().unwrap();
    let server = server(&state);

    let response = server
        .handle_request(request(
            Some(json!(7)),
            "tools/call",
            Some(json!({"name": "search_code", "arguments": {"query": "auth"}})),
        ))
        .await
        .unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["isError"], true);
    assert_eq!(result["content"][0]["text"], "Error: path is required");
}
