// Standalone MCP server binary: serves the aggregated catalog over stdio

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use toolbridge_mcp::{BridgeConfig, McpServer};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the JSON-RPC stream, log to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolbridge=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::info!("Toolbridge MCP server starting...");

    let config_path = std::env::var("TOOLBRIDGE_CONFIG")
        .unwrap_or_else(|_| "toolbridge.toml".to_string());
    let config = BridgeConfig::load(&PathBuf::from(config_path))?;

    let gateway = Arc::new(config.connect().await?);
    let catalog = gateway.refresh().await?;
    tracing::info!("Publishing {} tools", catalog.len());

    let server = McpServer::new(gateway);
    server.serve_stdio().await?;

    Ok(())
}
