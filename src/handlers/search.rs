//! Semantic search handler for tool discovery.
//!
//! Searches the full catalog regardless of the current visibility filter, so
//! an agent can find tools that are hidden from its tool list.

use crate::error::{AppError, Result};
use crate::scope::{ToolMatch, ToolSearch};
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// The natural language query to match against tools
    pub query: String,
    /// Number of results (default: TOOLSCOPE_DEFAULT_K)
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Keep only matches in these categories
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<ToolMatch>,
}

/// POST /search - Find tools relevant to a natural language query.
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start_time = std::time::Instant::now();

    // Validation
    if request.query.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Query cannot be empty".to_string(),
        ));
    }

    if request.top_k == Some(0) {
        return Err(AppError::ValidationError(
            "top_k must be at least 1".to_string(),
        ));
    }

    if !state.scope.is_ready() {
        return Err(AppError::ResourceError(
            "ToolScope not initialized".to_string(),
        ));
    }

    let results = state
        .scope
        .search(&request.query, request.top_k, request.categories.as_deref())
        .await;

    let total_time = start_time.elapsed();
    tracing::info!(
        query = %request.query,
        results = results.len(),
        total_ms = total_time.as_millis(),
        "Search completed"
    );

    metrics::counter!("search_requests_total").increment(1);
    metrics::histogram!("search_latency_ms").record(total_time.as_millis() as f64);

    Ok(Json(SearchResponse { results }))
}
