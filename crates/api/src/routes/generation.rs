//! Route definitions for the generation RPC surface.
//!
//! ```text
//! POST   /generate        generate_garments (synchronous)
//! POST   /jobs            start_generation
//! GET    /jobs            list_generations
//! GET    /jobs/{id}       get_generation
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Routes nested under `/generation`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generation::generate_garments))
        .route(
            "/jobs",
            post(generation::start_generation).get(generation::list_generations),
        )
        .route("/jobs/{id}", get(generation::get_generation))
}
