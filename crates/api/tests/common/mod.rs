// Each integration test binary compiles this module separately and uses a
// different subset of the helpers.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use garmgen_api::config::ServerConfig;
use garmgen_api::routes;
use garmgen_api::state::AppState;
use garmgen_core::config::GeneratorConfig;
use garmgen_core::generator::GeneratorService;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

/// Build a `GeneratorConfig` scoped to `scratch`, with tight poll
/// intervals so tests finish quickly.
pub fn test_generator_config(scratch: &Path, launcher: Option<PathBuf>) -> GeneratorConfig {
    GeneratorConfig {
        launcher_override: launcher,
        tmp_dir_override: Some(scratch.to_path_buf()),
        sync_timeout: Duration::from_secs(10),
        result_wait: Duration::from_millis(500),
        result_poll_interval: Duration::from_millis(20),
        worker_poll_interval: Duration::from_millis(20),
        ..GeneratorConfig::default()
    }
}

/// Build the full application router with all middleware layers.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses.
pub fn build_test_app(generator_config: GeneratorConfig) -> Router {
    let state = AppState {
        config: Arc::new(test_config()),
        generator: Arc::new(GeneratorService::new(generator_config)),
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// Write an executable launcher stub into `dir` and return its path.
///
/// The stub parses the real flag vocabulary; `body` runs afterwards with
/// `$out` bound to `--json_output_path` and `$name` to `--name`.
pub fn write_stub_launcher(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("launcher.sh");
    let script = format!(
        "#!/bin/bash\n\
         out=\"\"\n\
         name=\"\"\n\
         while [[ $# -gt 0 ]]; do\n\
         \x20 case \"$1\" in\n\
         \x20   --json_output_path) out=\"$2\"; shift 2 ;;\n\
         \x20   --name) name=\"$2\"; shift 2 ;;\n\
         \x20   *) shift ;;\n\
         \x20 esac\n\
         done\n\
         {body}\n"
    );
    std::fs::write(&path, script).expect("write launcher stub");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    }
    path
}

/// Send a GET request to the app.
pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Send a POST request with a JSON body to the app.
pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}
