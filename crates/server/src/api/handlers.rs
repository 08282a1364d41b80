use super::ApiResult;
use crate::config::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use toolbridge_core::{AggregationReport, ToolContext, ToolDescriptor};
use toolbridge_mcp::protocol::JsonRpcRequest;

/// List the published catalog
pub async fn catalog(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ToolDescriptor>>> {
    let tools = state.gateway.list().await?;
    tracing::debug!("Serving catalog with {} tools", tools.len());
    Ok(Json(tools))
}

/// Invoke a tool by its published name
pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CallToolRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let result = state
        .gateway
        .call(&req.name, req.input, req.context.as_ref())
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallToolRequest {
    pub name: String,
    #[serde(default)]
    pub input: serde_json::Value,
    /// Accepted but not forwarded to the provider
    #[serde(default)]
    pub context: Option<ToolContext>,
}

/// Re-aggregate all providers
pub async fn refresh(State(state): State<Arc<AppState>>) -> ApiResult<Json<RefreshResponse>> {
    let catalog = state.gateway.refresh().await?;

    tracing::info!("Catalog refreshed: {} tools", catalog.len());

    Ok(Json(RefreshResponse {
        tools: catalog.len(),
        report: catalog.report().clone(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub tools: usize,
    pub report: AggregationReport,
}

/// Describe the published snapshot
pub async fn status(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatusResponse>> {
    let catalog = state.gateway.catalog().await?;

    let duplicates = catalog
        .duplicate_names()
        .into_iter()
        .map(|(name, count)| DuplicateName { name, count })
        .collect();

    Ok(Json(StatusResponse {
        tools: catalog.len(),
        duplicates,
        report: catalog.report().clone(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub tools: usize,
    /// Published names shared by several entries; calls resolve to the first
    pub duplicates: Vec<DuplicateName>,
    pub report: AggregationReport,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DuplicateName {
    pub name: String,
    pub count: usize,
}

/// MCP JSON-RPC over HTTP
pub async fn mcp_rpc(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JsonRpcRequest>,
) -> Response {
    match state.mcp.handle(req).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
