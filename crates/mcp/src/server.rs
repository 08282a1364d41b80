// MCP server republishing the aggregated catalog

use crate::protocol::{
    CallToolParams, CallToolResult, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, PublishedTool, PublishedToolList, ServerCapabilities, ServerInfo,
    ToolContent, ToolsCapability, PROTOCOL_VERSION,
};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use toolbridge_core::{Gateway, GatewayError};

/// JSON-RPC error code used when a delegated call times out.
const TIMEOUT_ERROR_CODE: i64 = -32001;

/// Serves `initialize`, `ping`, `tools/list` and `tools/call` against a [`Gateway`].
pub struct McpServer {
    gateway: Arc<Gateway>,
}

impl McpServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Handle one message. Notifications produce no response.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            tracing::debug!("Received notification: {}", request.method);
            return None;
        };
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request()));
        }

        let outcome = match request.method.as_str() {
            "initialize" => to_json(initialize_result()),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => self.list_tools().await,
            "tools/call" => self.call_tool(request.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    /// Parse and handle one raw line of input.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                tracing::warn!("Unparseable request: {}", e);
                Some(JsonRpcResponse::error(
                    serde_json::Value::Null,
                    JsonRpcError::parse_error(),
                ))
            }
        }
    }

    /// Serve line-delimited JSON-RPC on stdin/stdout until stdin closes.
    pub async fn serve_stdio(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        tracing::info!("MCP server listening on stdio");
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                let mut payload = serde_json::to_string(&response)?;
                payload.push('\n');
                stdout.write_all(payload.as_bytes()).await?;
                stdout.flush().await?;
            }
        }
        tracing::info!("stdin closed, MCP server stopping");

        Ok(())
    }

    async fn list_tools(&self) -> Result<serde_json::Value, JsonRpcError> {
        let tools = self
            .gateway
            .list()
            .await
            .map_err(|e| JsonRpcError::internal_error(e.to_string()))?
            .into_iter()
            .map(PublishedTool::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| JsonRpcError::internal_error(e.to_string()))?;

        to_json(PublishedToolList { tools })
    }

    async fn call_tool(
        &self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("Missing params"))
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
            })?;

        match self.gateway.call(&params.name, params.arguments, None).await {
            Ok(result) => Ok(result),
            Err(e) => call_error(e),
        }
    }
}

fn initialize_result() -> InitializeResult {
    InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: false,
            }),
            experimental: serde_json::json!({}),
        },
        server_info: ServerInfo {
            name: "toolbridge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    }
}

fn to_json(value: impl Serialize) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

/// Map a gateway failure onto the MCP reply.
///
/// Upstream JSON-RPC errors are relayed with their original code and message.
/// Failures the gateway itself produced while running a tool become an
/// error-flagged tool result.
fn call_error(error: GatewayError) -> Result<serde_json::Value, JsonRpcError> {
    use toolbridge_core::ProviderError;

    match error {
        GatewayError::UnknownTool(name) => {
            Err(JsonRpcError::invalid_params(format!("Unknown tool: {}", name)))
        }
        GatewayError::AmbiguousTool { .. } => Err(JsonRpcError::invalid_params(error.to_string())),
        GatewayError::CatalogUnavailable(_) => Err(JsonRpcError::internal_error(error.to_string())),
        GatewayError::Timeout { .. } => Err(JsonRpcError::custom(TIMEOUT_ERROR_CODE, error.to_string())),
        GatewayError::ProviderInvocation {
            source: ProviderError::Remote { code, message },
            ..
        } => Err(JsonRpcError::custom(code, message)),
        other => to_json(CallToolResult {
            content: vec![ToolContent::error(error_chain(&other))],
            is_error: Some(true),
        }),
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
