use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::suggest::{list_tool_categories, suggest_tools, CategoryListing, SuggestContext, Suggestion};
use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    /// What the agent wants to do, e.g. "train a model"
    pub intent: String,
    #[serde(default)]
    pub context: SuggestContext,
}

/// POST /suggest - Recommend tools and a workflow for an intent.
///
/// The intent is recorded as conversation context.
pub async fn suggest_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SuggestRequest>,
) -> Result<Json<Suggestion>> {
    if request.intent.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Intent cannot be empty".to_string(),
        ));
    }

    let mut optimizer = state.optimizer.lock().await;
    let suggestion = suggest_tools(
        &request.intent,
        &request.context,
        &mut optimizer,
        state.scope.as_ref(),
    )
    .await;

    metrics::counter!("context_records_total").increment(1);

    Ok(Json(suggestion))
}

/// GET /categories - Tool categories with their key tools.
pub async fn categories_handler() -> Json<CategoryListing> {
    Json(list_tool_categories())
}
