// Upstream MCP server reached over HTTP (JSON-RPC POST, JSON or SSE replies)

use super::{into_result, ToolPages};
use crate::protocol::{CallToolParams, InitializeParams, JsonRpcRequest, JsonRpcResponse};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use toolbridge_core::{AsyncToolProvider, ProviderError, ToolDescriptor};
use url::Url;

const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpTransportConfig {
    pub url: Url,
    /// Extra headers sent with every request (e.g. authorization).
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Asynchronous-style provider speaking MCP over HTTP.
///
/// The `initialize` handshake runs lazily on first use; a session id returned
/// by the server is echoed on every later request.
pub struct HttpProvider {
    id: String,
    url: Url,
    client: Client,
    session: OnceCell<Option<String>>,
    next_id: AtomicU64,
}

impl HttpProvider {
    pub fn new(id: &str, config: &HttpTransportConfig) -> Result<Self, ProviderError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json, text/event-stream"),
        );
        for (name, value) in &config.headers {
            let name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ProviderError::Transport(format!("invalid header name '{}'", name)))?;
            let value = header::HeaderValue::from_str(value)
                .map_err(|_| ProviderError::Transport(format!("invalid value for header '{}'", name)))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .user_agent(concat!("toolbridge/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            id: id.to_string(),
            url: config.url.clone(),
            client,
            session: OnceCell::new(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn session_id(&self) -> Result<Option<String>, ProviderError> {
        self.session
            .get_or_try_init(|| async {
                let params = serde_json::to_value(InitializeParams::gateway())
                    .map_err(|e| ProviderError::Protocol(e.to_string()))?;
                let (result, session) = self.post("initialize", Some(params), None).await?;
                into_result(result)?;

                let note = JsonRpcRequest::notification("notifications/initialized");
                self.send(&note, session.as_deref()).await?;
                tracing::info!("Initialized HTTP provider '{}' at {}", self.id, self.url);
                Ok::<_, ProviderError>(session)
            })
            .await
            .cloned()
    }

    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ProviderError> {
        let session = self.session_id().await?;
        let (response, _) = self.post(method, params, session.as_deref()).await?;
        into_result(response)
    }

    async fn send(
        &self,
        request: &JsonRpcRequest,
        session: Option<&str>,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self.client.post(self.url.clone()).json(request);
        if let Some(session) = session {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Transport(format!("HTTP {}: {}", status, body)));
        }
        Ok(response)
    }

    async fn post(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        session: Option<&str>,
    ) -> Result<(JsonRpcResponse, Option<String>), ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(provider = %self.id, method, id, "HTTP JSON-RPC request");

        let response = self.send(&JsonRpcRequest::new(id, method, params), session).await?;
        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| session.map(str::to_string));
        let is_stream = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let parsed = if is_stream {
            response_from_event_stream(&body, id)?
        } else {
            serde_json::from_str(&body)
                .map_err(|e| ProviderError::Protocol(format!("invalid response: {}", e)))?
        };
        Ok((parsed, session))
    }
}

/// Pick the response to request `id` out of a server-sent event stream body.
fn response_from_event_stream(body: &str, id: u64) -> Result<JsonRpcResponse, ProviderError> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<JsonRpcResponse>(data.trim()).ok())
        .find(|response| response.id == serde_json::Value::from(id))
        .ok_or_else(|| ProviderError::Protocol(format!("no response to request {} in event stream", id)))
}

#[async_trait::async_trait]
impl AsyncToolProvider for HttpProvider {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
        let mut pages = ToolPages::default();
        loop {
            let result = self.request("tools/list", Some(pages.next_request()?)).await?;
            if pages.record(result)? {
                return Ok(pages.into_tools());
            }
        }
    }

    async fn call_tool(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments: input,
        })
        .map_err(|e| ProviderError::Protocol(e.to_string()))?;
        self.request("tools/call", Some(params)).await
    }
}
