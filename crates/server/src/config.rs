use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use toolbridge_core::Gateway;
use toolbridge_mcp::{BridgeConfig, McpServer};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ListenConfig,

    #[serde(flatten)]
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn load(config_path: &PathBuf) -> Result<Self> {
        // Load config file if it exists, otherwise use defaults
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .context("Failed to read configuration file")?;
            toml::from_str(&content).context("Failed to parse configuration file")
        } else {
            tracing::info!("Configuration file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Address to bind the API server to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub mcp: Arc<McpServer>,
}

impl AppState {
    /// Connect providers and publish the first catalog.
    ///
    /// A failed first aggregation is logged; the catalog endpoints then report
    /// it until a refresh succeeds.
    pub async fn new(config: &ServerConfig) -> Result<Self> {
        let gateway = Arc::new(config.bridge.connect().await?);

        match gateway.refresh().await {
            Ok(catalog) => tracing::info!("Catalog ready with {} tools", catalog.len()),
            Err(e) => tracing::error!("Initial aggregation failed: {}", e),
        }

        Ok(Self::from_gateway(gateway))
    }

    pub fn from_gateway(gateway: Arc<Gateway>) -> Self {
        let mcp = Arc::new(McpServer::new(gateway.clone()));
        Self { gateway, mcp }
    }
}
