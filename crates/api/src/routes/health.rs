use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether generator launcher discovery currently succeeds.
    pub launcher_resolved: bool,
}

/// GET /health -- returns service health and launcher discoverability.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let launcher_resolved = state.generator.launcher_resolved();

    let status = if launcher_resolved { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        launcher_resolved,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
