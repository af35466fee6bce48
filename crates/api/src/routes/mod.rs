pub mod generation;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /generation/generate        synchronous generation (POST)
/// /generation/jobs            start job (POST), list jobs (GET)
/// /generation/jobs/{id}       job snapshot (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/generation", generation::router())
}
