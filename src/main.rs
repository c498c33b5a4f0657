//! context-index - MCP server for codebase indexing and semantic search

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use context_index::config::{Config, ConfigOptions};
use context_index::engine::ContextEngine;
use context_index::mcp::{McpServer, TransportMode};
use context_index::vector::{HttpVectorService, VectorIndexService};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(ValueEnum, Debug, Copy, Clone)]
enum TransportArg {
    Auto,
    Lsp,
    Line,
}

#[derive(Parser, Debug)]
#[command(name = "context-index")]
#[command(about = "MCP server for codebase indexing and semantic search")]
struct Args {
    /// Base URL of the vector store
    #[arg(long)]
    base_url: String,

    /// Vector store API token
    #[arg(long, env = "VECTOR_STORE_TOKEN", hide_env_values = true)]
    token: String,

    /// Transport framing: auto, lsp, line
    #[arg(long, value_enum, default_value = "auto")]
    transport: TransportArg,

    /// Snapshot file (default: ~/.context/mcp-codebase-snapshot.json)
    #[arg(long)]
    snapshot_path: Option<PathBuf>,

    /// Stop indexing a codebase after this many chunks
    #[arg(long)]
    max_chunks: Option<usize>,

    /// Minimum interval between progress checkpoints in milliseconds
    #[arg(long)]
    checkpoint_interval_ms: Option<u64>,

    /// Concurrent insert requests while uploading (default: adaptive)
    #[arg(long)]
    upload_concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, stdout carries the protocol
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = Config::new(
        args.base_url,
        args.token,
        ConfigOptions {
            snapshot_path: args.snapshot_path,
            checkpoint_interval_ms: args.checkpoint_interval_ms,
            max_chunks: args.max_chunks,
            upload_concurrency: args.upload_concurrency,
            ..Default::default()
        },
    )?;

    info!("Starting context-index MCP server against {}", config.base_url);

    let service: Arc<dyn VectorIndexService> = Arc::new(HttpVectorService::new(config.clone())?);
    let engine = Arc::new(ContextEngine::open(config, service));

    let report = engine.reconcile().await;
    if !report.removed.is_empty() {
        info!("Removed {} stale snapshot record(s)", report.removed.len());
    }

    let transport_mode = match args.transport {
        TransportArg::Auto => None,
        TransportArg::Lsp => Some(TransportMode::Lsp),
        TransportArg::Line => Some(TransportMode::Line),
    };

    let server = McpServer::new(engine.clone(), transport_mode);
    let result = server.run().await;

    engine.shutdown().await;

    if let Err(e) = result {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
