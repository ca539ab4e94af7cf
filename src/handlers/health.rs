use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct ComponentHealth {
    pub healthy: bool,
    pub message: String,
}

impl From<(bool, String)> for ComponentHealth {
    fn from((healthy, message): (bool, String)) -> Self {
        Self { healthy, message }
    }
}

#[derive(Serialize)]
pub struct Components {
    pub optimizer: ComponentHealth,
    pub toolscope: ComponentHealth,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

/// GET /health - Liveness check with component status
///
/// Never waits on the optimizer lock: a listing in progress may be blocked on
/// a slow embedding provider.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let optimizer = match state.optimizer.try_lock() {
        Ok(optimizer) => optimizer.health(),
        Err(_) => (true, "Optimizer busy (tool listing in progress)".to_string()),
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        components: Some(Components {
            optimizer: optimizer.into(),
            toolscope: state.scope.health().into(),
        }),
    })
}

/// GET /ready - Readiness check
///
/// State is fully built (catalog loaded, index initialised, optimizer
/// installed) before the listener is bound, so serving implies ready.
pub async fn ready_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ready",
        version: env!("CARGO_PKG_VERSION"),
        components: None,
    })
}
