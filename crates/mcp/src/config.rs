// Configuration shared by the HTTP server and the stdio MCP server

use crate::upstream::{connect_providers, ProviderConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use toolbridge_core::{Gateway, GatewayConfig};

/// `[gateway]` and `[[providers]]` sections of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl BridgeConfig {
    /// Load from a TOML file; a missing file yields defaults.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::info!("Configuration file not found, using defaults");
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(config_path).context("Failed to read configuration file")?;
        toml::from_str(&content).context("Failed to parse configuration file")
    }

    /// Connect all providers and build an un-aggregated gateway.
    pub async fn connect(&self) -> Result<Gateway> {
        let registry = connect_providers(&self.providers, self.gateway.on_provider_failure)
            .await
            .context("Failed to connect providers")?;
        Ok(Gateway::new(registry, self.gateway.clone()))
    }
}
