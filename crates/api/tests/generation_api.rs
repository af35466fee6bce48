//! Integration tests for the generation RPC surface: the synchronous
//! operation and the asynchronous start/poll pair, driven end-to-end
//! against stub launchers.

mod common;

use std::path::Path;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use axum::http::StatusCode;
use axum::Router;
use common::{body_json, get, post_json, test_generator_config, write_stub_launcher};
use serde_json::json;

/// Poll `GET /generation/jobs/{id}` until the job is terminal, asserting
/// `elapsed_sec` never decreases along the way.
async fn poll_until_terminal(app: &Router, job_id: &str) -> serde_json::Value {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut last_elapsed = 0.0_f64;

    loop {
        let response = get(app, &format!("/api/v1/generation/jobs/{job_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot = body_json(response).await;

        if let Some(elapsed) = snapshot["elapsed_sec"].as_f64() {
            assert!(
                elapsed >= last_elapsed,
                "elapsed_sec went backwards: {elapsed} < {last_elapsed}"
            );
            last_elapsed = elapsed;
        }

        let status = snapshot["status"].as_str().expect("status");
        if status == "succeeded" || status == "failed" {
            return snapshot;
        }
        assert_matches!(status, "queued" | "running");

        assert!(Instant::now() < deadline, "job never reached a terminal state");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

// ---------------------------------------------------------------------------
// Synchronous operation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generate_returns_dataset_path_on_success() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let launcher = write_stub_launcher(
        scratch.path(),
        "echo \"sampling $name\"\nprintf '{\"dataset_path\": \"/data/test_dress_001\"}' > \"$out\"",
    );
    let app = common::build_test_app(test_generator_config(scratch.path(), Some(launcher)));

    let response = post_json(
        &app,
        "/api/v1/generation/generate",
        json!({"count": 5, "garment_type": "dress", "name_prefix": "test"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["dataset_path"], "/data/test_dress_001");
    assert_eq!(body["generated_count"], 5);
    assert_eq!(body["garment_type"], "dress");
    assert_eq!(body["exit_code"], 0);
    assert!(body["message"].as_str().expect("message").contains('5'));
}

#[tokio::test]
async fn generate_rejects_out_of_range_count() {
    let scratch = tempfile::tempdir().expect("tempdir");
    // A launcher that would leave a marker file if it ever ran.
    let launcher = write_stub_launcher(
        scratch.path(),
        "touch \"$(dirname \"$0\")/ran.marker\"",
    );
    let app = common::build_test_app(test_generator_config(scratch.path(), Some(launcher)));

    for count in [0, 101] {
        let response = post_json(
            &app,
            "/api/v1/generation/generate",
            json!({"count": count}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    assert!(
        !scratch.path().join("ran.marker").exists(),
        "validation failures must not spawn the generator"
    );
}

#[tokio::test]
async fn generate_reports_launcher_not_found_as_a_result() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let missing = scratch.path().join("missing.sh");
    let app = common::build_test_app(test_generator_config(scratch.path(), Some(missing)));

    let response = post_json(
        &app,
        "/api/v1/generation/generate",
        json!({"count": 5}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    let error = body["error"].as_str().expect("error");
    assert!(error.contains("launcher"), "got: {error}");
}

#[tokio::test]
async fn generate_reports_generator_failure_with_tails() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let launcher = write_stub_launcher(
        scratch.path(),
        "echo \"loading patterns\"\necho \"fatal: bad template\" >&2\nexit 7",
    );
    let app = common::build_test_app(test_generator_config(scratch.path(), Some(launcher)));

    let response = post_json(
        &app,
        "/api/v1/generation/generate",
        json!({"count": 5}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["exit_code"], 7);
    let stderr_tail = body["stderr_tail"].as_array().expect("stderr_tail");
    assert!(stderr_tail
        .iter()
        .any(|l| l.as_str().unwrap_or_default().contains("bad template")));
}

#[tokio::test]
async fn generate_fails_when_handoff_never_appears() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let launcher = write_stub_launcher(scratch.path(), "echo done");
    let app = common::build_test_app(test_generator_config(scratch.path(), Some(launcher)));

    let response = post_json(
        &app,
        "/api/v1/generation/generate",
        json!({"count": 5}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["exit_code"], 0, "the generator itself exited cleanly");
    let error = body["error"].as_str().expect("error");
    assert!(error.contains("not ready"), "got: {error}");
}

// ---------------------------------------------------------------------------
// Asynchronous operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_then_poll_to_success() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let launcher = write_stub_launcher(
        scratch.path(),
        "sleep 0.2\nprintf '{\"dataset_path\": \"/data/test_dress_001\"}' > \"$out\"",
    );
    let app = common::build_test_app(test_generator_config(scratch.path(), Some(launcher)));

    let begun = Instant::now();
    let response = post_json(
        &app,
        "/api/v1/generation/jobs",
        json!({"count": 5, "garment_type": "dress", "name_prefix": "test"}),
    )
    .await;
    assert!(
        begun.elapsed() < Duration::from_secs(1),
        "start_generation must return immediately"
    );
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "queued");
    let job_id = body["job_id"].as_str().expect("job_id");
    assert_eq!(job_id.len(), 64);
    assert!(job_id.chars().all(|c| c.is_ascii_hexdigit()));

    let snapshot = poll_until_terminal(&app, job_id).await;
    assert_eq!(snapshot["success"], true);
    assert_eq!(snapshot["status"], "succeeded");
    assert_eq!(snapshot["dataset_path"], "/data/test_dress_001");
    assert_eq!(snapshot["params"]["count"], 5);

    // The hand-off file must be gone once the job is terminal.
    let tmp_json = snapshot["tmp_json_path"].as_str().expect("tmp_json_path");
    assert!(
        !Path::new(tmp_json).exists(),
        "hand-off file should be deleted after completion"
    );
}

#[tokio::test]
async fn start_rejects_out_of_range_count() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let app = common::build_test_app(test_generator_config(scratch.path(), None));

    let response = post_json(&app, "/api/v1/generation/jobs", json!({"count": 500})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn failed_generator_propagates_exit_code() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let launcher = write_stub_launcher(scratch.path(), "exit 7");
    let app = common::build_test_app(test_generator_config(scratch.path(), Some(launcher)));

    let response = post_json(&app, "/api/v1/generation/jobs", json!({"count": 3})).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let job_id = body_json(response).await["job_id"]
        .as_str()
        .expect("job_id")
        .to_string();

    let snapshot = poll_until_terminal(&app, &job_id).await;
    assert_eq!(snapshot["success"], false);
    assert_eq!(snapshot["status"], "failed");
    assert_eq!(snapshot["exit_code"], 7);
}

#[tokio::test]
async fn get_unknown_job_returns_404() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let app = common::build_test_app(test_generator_config(scratch.path(), None));

    let response = get(&app, "/api/v1/generation/jobs/deadbeef").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn concurrent_starts_get_distinct_ids() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let launcher = write_stub_launcher(
        scratch.path(),
        "printf '{\"dataset_path\": \"/data/%s\"}' \"$name\" > \"$out\"",
    );
    let app = common::build_test_app(test_generator_config(scratch.path(), Some(launcher)));

    let mut ids = Vec::new();
    for i in 0..5 {
        let response = post_json(
            &app,
            "/api/v1/generation/jobs",
            json!({"count": 2, "garment_type": "dress", "name_prefix": format!("batch{i}")}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        ids.push(
            body_json(response).await["job_id"]
                .as_str()
                .expect("job_id")
                .to_string(),
        );
    }

    let unique: std::collections::HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len(), "job ids must be distinct");

    // Every job succeeds with a dataset path derived from its own params.
    for (i, id) in ids.iter().enumerate() {
        let snapshot = poll_until_terminal(&app, id).await;
        assert_eq!(snapshot["status"], "succeeded");
        assert_eq!(
            snapshot["dataset_path"],
            format!("/data/batch{i}_dress"),
            "records must not cross-contaminate"
        );
    }
}

#[tokio::test]
async fn list_returns_retained_jobs() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let launcher = write_stub_launcher(
        scratch.path(),
        "printf '{\"dataset_path\": \"/data/x\"}' > \"$out\"",
    );
    let app = common::build_test_app(test_generator_config(scratch.path(), Some(launcher)));

    let first = post_json(&app, "/api/v1/generation/jobs", json!({"count": 1})).await;
    let second = post_json(&app, "/api/v1/generation/jobs", json!({"count": 2})).await;
    let first_id = body_json(first).await["job_id"].as_str().unwrap().to_string();
    let second_id = body_json(second).await["job_id"].as_str().unwrap().to_string();

    let response = get(&app, "/api/v1/generation/jobs").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    let jobs = body["jobs"].as_array().expect("jobs");
    let listed: Vec<&str> = jobs
        .iter()
        .map(|j| j["job_id"].as_str().expect("job_id"))
        .collect();
    assert!(listed.contains(&first_id.as_str()));
    assert!(listed.contains(&second_id.as_str()));

    // Let the workers finish before the scratch dir is torn down.
    poll_until_terminal(&app, &first_id).await;
    poll_until_terminal(&app, &second_id).await;
}
