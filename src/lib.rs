//! ToolScope - context-aware tool visibility for small language models
//!
//! Serves an MCP tool catalog and narrows the tools a model sees to a budget,
//! using recent conversation context and semantic search over tool
//! descriptions.

pub mod catalog;
pub mod config;
pub mod embedding;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod ingestion;
pub mod optimizer;
pub mod persistence;
pub mod scope;
pub mod state;
pub mod suggest;

// Re-export key types for convenience
pub use catalog::{ToolLister, ToolRegistry};
pub use config::{Config, FilterConfig, FilterMode, ScopeConfig};
pub use embedding::Embedder;
pub use error::{AppError, Result};
pub use ingestion::{atomize_tools, ToolDescriptor};
pub use optimizer::{ConversationContextBuffer, SmallModelOptimizer};
pub use scope::{ToolMatch, ToolScope, ToolSearch};
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Service routes, without middleware or the metrics endpoint.
pub fn router(state: Arc<AppState>) -> Router {
    use handlers::{
        categories_handler, context_handler, health_handler, list_tools_handler, ready_handler,
        search_handler, suggest_handler,
    };

    Router::new()
        .route("/tools", get(list_tools_handler))
        .route("/context", post(context_handler))
        .route("/search", post(search_handler))
        .route("/suggest", post(suggest_handler))
        .route("/categories", get(categories_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .with_state(state)
}
