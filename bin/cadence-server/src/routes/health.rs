//! Health, readiness and liveness endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::warn;
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health, get_ready, get_live))]
pub struct HealthApi;

/// Register health-check routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(get_health))
        .route("/health/ready", get(get_ready))
        .route("/health/live", get(get_live))
}

/// Heartbeat endpoint.
///
/// Returns `{"status": "ok", "version": "..."}` with HTTP 200.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is healthy", body = Value)
    )
)]
pub async fn get_health() -> Json<Value> {
    Json(json!({
        "status":  "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe: 200 once the inference engine answers, 503 otherwise.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Engine can accept jobs", body = Value),
        (status = 503, description = "Engine unavailable", body = Value)
    )
)]
pub async fn get_ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let engine = state.jobs.engine_name().to_owned();
    match state.jobs.probe_engine().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "engine": engine })),
        ),
        Err(e) => {
            warn!(engine = %engine, error = %e, "readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "not_ready", "engine": engine })),
            )
        }
    }
}

/// Liveness probe: the process is up and serving.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Process is alive", body = Value)
    )
)]
pub async fn get_live() -> Json<Value> {
    Json(json!({
        "status": "alive",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
