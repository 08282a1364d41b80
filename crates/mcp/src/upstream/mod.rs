//! Connections to upstream MCP servers.
//!
//! Stdio servers are driven with blocking pipes and registered as
//! synchronous-style providers; HTTP servers use `reqwest` and are registered
//! as asynchronous-style providers.

pub mod http;
pub mod stdio;

pub use http::{HttpProvider, HttpTransportConfig};
pub use stdio::{McpSession, StdioProvider, StdioTransportConfig};

use crate::protocol::{JsonRpcResponse, ListToolsParams, ListToolsResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use toolbridge_core::{FailurePolicy, ProviderError, ProviderRegistry, ToolDescriptor};

/// Upper bound on `tools/list` pages fetched from a single provider.
const MAX_LIST_PAGES: usize = 64;

/// One `[[providers]]` entry of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    /// Alias used by `prefix_mode = "alias"` with `alias_source = "provider"`.
    #[serde(default)]
    pub alias: Option<String>,
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    Stdio(StdioTransportConfig),
    Http(HttpTransportConfig),
}

/// Connect every configured provider and register it in configuration order.
///
/// A provider that cannot be started is skipped or aborts the whole setup,
/// following the same policy as a failed tool listing.
pub async fn connect_providers(
    configs: &[ProviderConfig],
    on_failure: FailurePolicy,
) -> Result<ProviderRegistry, ProviderError> {
    let mut registry = ProviderRegistry::new();

    for config in configs {
        match connect(config).await {
            Ok(Connected::Stdio(provider)) => {
                registry.register_sync(config.id.clone(), config.alias.clone(), provider);
            }
            Ok(Connected::Http(provider)) => {
                registry.register_async(config.id.clone(), config.alias.clone(), provider);
            }
            Err(e) if on_failure == FailurePolicy::Skip => {
                tracing::warn!("Skipping provider '{}', failed to connect: {}", config.id, e);
            }
            Err(e) => {
                tracing::error!("Failed to connect provider '{}': {}", config.id, e);
                return Err(e);
            }
        }
    }

    tracing::info!("Connected {} of {} providers", registry.len(), configs.len());
    Ok(registry)
}

enum Connected {
    Stdio(Arc<StdioProvider>),
    Http(Arc<HttpProvider>),
}

async fn connect(config: &ProviderConfig) -> Result<Connected, ProviderError> {
    match &config.transport {
        TransportConfig::Stdio(stdio) => {
            let id = config.id.clone();
            let stdio = stdio.clone();
            let provider = tokio::task::spawn_blocking(move || StdioProvider::spawn(&id, &stdio))
                .await
                .map_err(|e| ProviderError::Transport(format!("spawn task failed: {}", e)))??;
            Ok(Connected::Stdio(Arc::new(provider)))
        }
        TransportConfig::Http(http) => Ok(Connected::Http(Arc::new(HttpProvider::new(
            &config.id, http,
        )?))),
    }
}

/// Pages of one `tools/list` listing.
///
/// Every transport drives the same loop: ask for [`next_request`] params,
/// send them, [`record`] the result, stop once it reports completion.
///
/// [`next_request`]: ToolPages::next_request
/// [`record`]: ToolPages::record
#[derive(Debug, Default)]
pub(crate) struct ToolPages {
    tools: Vec<ToolDescriptor>,
    cursor: Option<String>,
    fetched: usize,
}

impl ToolPages {
    /// Params for the next `tools/list` request.
    pub(crate) fn next_request(&self) -> Result<serde_json::Value, ProviderError> {
        if self.fetched >= MAX_LIST_PAGES {
            return Err(ProviderError::Protocol(format!(
                "tools/list did not finish after {} pages",
                MAX_LIST_PAGES
            )));
        }
        serde_json::to_value(ListToolsParams {
            cursor: self.cursor.clone(),
        })
        .map_err(|e| ProviderError::Protocol(e.to_string()))
    }

    /// Add one page of results. Returns `true` when no pages remain.
    pub(crate) fn record(&mut self, result: serde_json::Value) -> Result<bool, ProviderError> {
        let page: ListToolsResult = serde_json::from_value(result)
            .map_err(|e| ProviderError::Protocol(format!("invalid tools/list result: {}", e)))?;
        self.fetched += 1;
        self.tools.extend(page.tools.into_iter().map(ToolDescriptor::from));
        self.cursor = page.next_cursor;
        Ok(self.cursor.is_none())
    }

    pub(crate) fn into_tools(self) -> Vec<ToolDescriptor> {
        self.tools
    }
}

/// Extract the result of a response, mapping JSON-RPC errors to [`ProviderError::Remote`].
pub(crate) fn into_result(response: JsonRpcResponse) -> Result<serde_json::Value, ProviderError> {
    if let Some(error) = response.error {
        return Err(ProviderError::Remote {
            code: error.code,
            message: error.message,
        });
    }
    response
        .result
        .ok_or_else(|| ProviderError::Protocol("response has neither result nor error".to_string()))
}
