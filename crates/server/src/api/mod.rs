use crate::config::AppState;
use anyhow::Result;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use toolbridge_core::GatewayError;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

mod handlers;

/// Start the API server
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the API router
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        // Catalog routes
        .route("/mcp/gateway/catalog", get(handlers::catalog))
        .route("/mcp/gateway/status", get(handlers::status))
        .route("/mcp/gateway/call", post(handlers::call_tool))
        .route("/mcp/gateway/refresh", post(handlers::refresh))
        // MCP JSON-RPC endpoint
        .route("/mcp", post(handlers::mcp_rpc))
        // Middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "toolbridge",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Custom error type for API handlers
pub struct ApiError {
    status: StatusCode,
    error: anyhow::Error,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_msg = self.error.to_string();
        let details = self
            .error
            .chain()
            .skip(1)
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(": ");

        let response = if details.is_empty() {
            ErrorResponse::new(error_msg)
        } else {
            ErrorResponse::with_details(error_msg, details)
        };

        (self.status, Json(response)).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let status = match &err {
            GatewayError::UnknownTool(_) => StatusCode::NOT_FOUND,
            GatewayError::AmbiguousTool { .. } => StatusCode::CONFLICT,
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::ProviderEnumeration { .. }
            | GatewayError::ProviderInvocation { .. }
            | GatewayError::ProviderGone(_) => StatusCode::BAD_GATEWAY,
            GatewayError::CatalogUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self {
            status,
            error: err.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: err,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use toolbridge_core::{
        AsyncToolProvider, FailurePolicy, Gateway, GatewayConfig, PrefixMode, ProviderError,
        ProviderRegistry, SyncToolProvider, ToolDescriptor,
    };
    use tower::ServiceExt;

    struct LocalProvider {
        tools: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl LocalProvider {
        fn new(tools: Vec<&'static str>) -> Self {
            Self {
                tools,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl SyncToolProvider for LocalProvider {
        fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
            Ok(self
                .tools
                .iter()
                .map(|name| ToolDescriptor::new(*name, format!("{} tool", name), "{}"))
                .collect())
        }

        fn call_tool(&self, name: &str, input: Value) -> Result<Value, ProviderError> {
            self.calls.lock().unwrap().push(name.to_string());
            if name == "broken" {
                return Err(ProviderError::Transport("connection reset".to_string()));
            }
            Ok(json!({ "echo": input, "tool": name }))
        }
    }

    struct DownProvider;

    #[async_trait::async_trait]
    impl AsyncToolProvider for DownProvider {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
            Err(ProviderError::Transport("connection refused".to_string()))
        }

        async fn call_tool(&self, _name: &str, _input: Value) -> Result<Value, ProviderError> {
            Err(ProviderError::Transport("connection refused".to_string()))
        }
    }

    async fn app_with(registry: ProviderRegistry, config: GatewayConfig, refresh: bool) -> Router {
        let gateway = Arc::new(Gateway::new(registry, config));
        if refresh {
            let _ = gateway.refresh().await;
        }
        create_router(AppState::from_gateway(gateway))
    }

    async fn app() -> (Router, Arc<LocalProvider>, Arc<LocalProvider>) {
        let p1 = Arc::new(LocalProvider::new(vec!["x", "broken"]));
        let p2 = Arc::new(LocalProvider::new(vec!["x"]));
        let mut registry = ProviderRegistry::new();
        registry.register_sync("p1", None, p1.clone());
        registry.register_sync("p2", None, p2.clone());
        registry.register_async("down", None, Arc::new(DownProvider));
        (app_with(registry, GatewayConfig::default(), true).await, p1, p2)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = app().await;
        let (status, body) = send(app, get("/api/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_catalog_lists_duplicates_in_order() {
        let (app, _, _) = app().await;
        let (status, body) = send(app, get("/mcp/gateway/catalog")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                {"name": "x", "description": "x tool", "inputSchema": "{}"},
                {"name": "broken", "description": "broken tool", "inputSchema": "{}"},
                {"name": "x", "description": "x tool", "inputSchema": "{}"}
            ])
        );
    }

    #[tokio::test]
    async fn test_call_first_match_wins() {
        let (app, p1, p2) = app().await;
        let (status, body) = send(
            app,
            post_json("/mcp/gateway/call", json!({"name": "x", "input": {"q": "rust"}})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"echo": {"q": "rust"}, "tool": "x"}));
        assert_eq!(p1.calls.lock().unwrap().clone(), vec!["x".to_string()]);
        assert!(p2.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_call_error_statuses() {
        let (app, _, _) = app().await;

        let (status, body) =
            send(app.clone(), post_json("/mcp/gateway/call", json!({"name": "nope"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "tool not found: nope");

        let (status, body) =
            send(app, post_json("/mcp/gateway/call", json!({"name": "broken"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["details"].as_str().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_status_reports_skipped_provider() {
        let (app, _, _) = app().await;
        let (status, body) = send(app, get("/mcp/gateway/status")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tools"], 3);
        assert_eq!(body["duplicates"], json!([{"name": "x", "count": 2}]));
        assert_eq!(body["report"]["providers"][2]["provider"], "down");
        assert!(body["report"]["providers"][2]["error"].is_string());
    }

    #[tokio::test]
    async fn test_catalog_unavailable_when_aggregation_failed() {
        let mut registry = ProviderRegistry::new();
        registry.register_async("down", None, Arc::new(DownProvider));
        let config = GatewayConfig {
            on_provider_failure: FailurePolicy::Fail,
            ..Default::default()
        };
        let app = app_with(registry, config, true).await;

        let (status, _) = send(app.clone(), get("/mcp/gateway/catalog")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = send(app, post_json("/mcp/gateway/refresh", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_refresh_publishes_catalog() {
        let mut registry = ProviderRegistry::new();
        registry.register_sync("p1", None, Arc::new(LocalProvider::new(vec!["a"])));
        let config = GatewayConfig {
            prefix_mode: PrefixMode::Static,
            ..Default::default()
        };
        let app = app_with(registry, config, false).await;

        let (status, _) = send(app.clone(), get("/mcp/gateway/catalog")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = send(app.clone(), post_json("/mcp/gateway/refresh", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tools"], 1);

        let (_, body) = send(app, get("/mcp/gateway/catalog")).await;
        assert_eq!(body[0]["name"], "gw_a");
    }

    #[tokio::test]
    async fn test_mcp_endpoint() {
        let (app, _, _) = app().await;

        let (status, body) = send(
            app.clone(),
            post_json("/mcp", json!({"jsonrpc": "2.0", "id": 5, "method": "tools/list"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 5);
        assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 3);

        let (status, _) = send(
            app,
            post_json("/mcp", json!({"jsonrpc": "2.0", "method": "notifications/initialized"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
}
