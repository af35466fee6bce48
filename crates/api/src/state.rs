use std::sync::Arc;

use garmgen_core::generator::GeneratorService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The generation facade: registry, workers, and subprocess plumbing.
    pub generator: Arc<GeneratorService>,
}
