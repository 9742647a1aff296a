//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;

use crate::{state::AppState, types::HealthResponse};

/// Create health check router
pub fn health_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let vault = state.read(|host| host.vault.id()).await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().timestamp(),
        vault,
    })
}
