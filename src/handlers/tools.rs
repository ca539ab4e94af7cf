use crate::catalog::ToolLister;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    /// Original MCP tool definitions, in visibility order
    pub tools: Vec<Value>,
}

/// GET /tools - Tools the model may currently see.
pub async fn list_tools_handler(State(state): State<Arc<AppState>>) -> Json<ToolsResponse> {
    let optimizer = state.optimizer.lock().await;
    let tools = optimizer.list_tools().await;

    tracing::debug!(
        visible = tools.len(),
        total = optimizer.total_tool_count(),
        mode = optimizer.mode().as_str(),
        "Listed tools"
    );

    metrics::counter!("list_tools_requests_total").increment(1);
    metrics::gauge!("visible_tools").set(tools.len() as f64);

    Json(ToolsResponse {
        tools: tools.into_iter().map(|t| t.raw_definition).collect(),
    })
}
