//! Volo Operator Backend
//!
//! Hosts a single vault and exposes its user, operator and admin surfaces
//! as a JSON REST API. Operator and admin routes are guarded by separate
//! API key sets.

pub mod error;
pub mod routes;
pub mod services;
pub mod state;
pub mod types;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::warn;

use routes::{admin_router, health_router, operator_router, vault_router};
use state::AppState;
use types::Config;

/// Maximum accepted request body
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build the full application router around a freshly created vault
pub fn build_app(config: Arc<Config>) -> anyhow::Result<Router> {
    let state = AppState::new(config.clone())?;
    let cors = build_cors_layer(&config);

    Ok(Router::new()
        .merge(health_router(state.clone()))
        .merge(vault_router(state.clone()))
        .merge(operator_router(state.clone()))
        .merge(admin_router(state))
        .layer(middleware::from_fn_with_state(config, api_key_middleware))
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http()))
}

/// Build CORS layer from config
fn build_cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("x-api-key"),
        ])
}

/// API keys guarding a path, or `None` for unauthenticated routes
fn keys_for_path<'a>(config: &'a Config, path: &str) -> Option<(&'static str, &'a [String])> {
    if path == "/health" {
        None
    } else if path.starts_with("/api/admin") {
        Some(("admin", &config.admin_api_keys))
    } else if path.starts_with("/api/operator") {
        Some(("operator", &config.operator_api_keys))
    } else {
        Some(("user", &config.api_keys))
    }
}

fn key_matches(keys: &[String], candidate: &str) -> bool {
    keys.iter()
        .any(|key| constant_time_eq::constant_time_eq(key.as_bytes(), candidate.as_bytes()))
}

/// Role-based API key authentication middleware
async fn api_key_middleware(
    State(config): State<Arc<Config>>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some((role, keys)) = keys_for_path(&config, request.uri().path()) else {
        return Ok(next.run(request).await);
    };

    // No keys for this role: development mode
    if keys.is_empty() {
        warn!(role, "No API keys configured - running in development mode");
        return Ok(next.run(request).await);
    }

    let api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            warn!(role, "Request missing API key");
            StatusCode::UNAUTHORIZED
        })?;

    // Don't log the actual key
    if !key_matches(keys, api_key) {
        warn!(role, "Invalid API key provided");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
