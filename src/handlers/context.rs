use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ContextRequest {
    /// User intent for the current turn
    pub query: String,
    /// Tools invoked in response, if any
    #[serde(default)]
    pub tool_calls: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ContextResponse {
    pub recorded: bool,
    /// Entries currently retained
    pub context_size: usize,
    pub combined_query: String,
}

/// POST /context - Record a conversation turn for tool filtering.
pub async fn context_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ContextRequest>,
) -> Result<Json<ContextResponse>> {
    if request.query.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Query cannot be empty".to_string(),
        ));
    }

    let mut optimizer = state.optimizer.lock().await;
    optimizer.record_context(request.query, request.tool_calls);

    let context = optimizer.context();
    tracing::debug!(entries = context.len(), "Context recorded");
    metrics::counter!("context_records_total").increment(1);

    Ok(Json(ContextResponse {
        recorded: true,
        context_size: context.len(),
        combined_query: context.combined_query(),
    }))
}
