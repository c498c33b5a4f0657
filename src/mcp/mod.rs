//! MCP (Model Context Protocol) module

pub mod server;
pub mod transport;
pub mod types;

pub use server::{McpServer, TOOLS};
pub use transport::{is_header_line, parse_content_length, TransportMode, MAX_HEADER_COUNT};
