//! Handlers for the generation RPC surface.
//!
//! Routes:
//! - `POST /generation/generate`   — run one generation to completion
//! - `POST /generation/jobs`       — enqueue a job, return immediately
//! - `GET  /generation/jobs`       — list retained jobs
//! - `GET  /generation/jobs/{id}`  — poll a job snapshot
//!
//! Generation outcomes — success or generator failure — are the
//! operation's *result* and ship as 200 with a `success` flag; only
//! request-shaped problems (validation, unknown id) surface as HTTP
//! errors via [`AppError`].

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use garmgen_core::error::CoreError;
use garmgen_core::generator::{GenerationFailure, GenerationOutcome, StartedJob};
use garmgen_core::job::{JobParams, JobSnapshot};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response payloads
// ---------------------------------------------------------------------------

/// Body shared by both generation entry points.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Number of garments to generate (1-100).
    pub count: u32,
    /// Garment type; the generator currently treats `any` as the default
    /// configuration.
    #[serde(default = "default_garment_type")]
    pub garment_type: String,
    /// Dataset name prefix.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
}

fn default_garment_type() -> String {
    "any".to_string()
}

fn default_name_prefix() -> String {
    "generated".to_string()
}

impl GenerateRequest {
    fn into_params(self) -> JobParams {
        JobParams {
            count: self.count,
            garment_type: self.garment_type,
            name_prefix: self.name_prefix,
        }
    }
}

/// Result object of the synchronous operation.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub garment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout_tail: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_tail: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: String,
}

impl GenerateResponse {
    fn from_outcome(outcome: GenerationOutcome) -> Self {
        Self {
            success: true,
            message: outcome.message,
            dataset_path: Some(outcome.dataset_path),
            generated_count: Some(outcome.generated_count),
            garment_type: Some(outcome.garment_type),
            logs: Some(outcome.logs),
            stdout_tail: Some(outcome.stdout_tail),
            stderr_tail: Some(outcome.stderr_tail),
            exit_code: Some(0),
            error: None,
        }
    }

    fn from_failure(failure: GenerationFailure) -> Self {
        Self {
            success: false,
            message: "Generation failed".to_string(),
            dataset_path: None,
            generated_count: None,
            garment_type: None,
            logs: None,
            stdout_tail: (!failure.stdout_tail.is_empty()).then_some(failure.stdout_tail),
            stderr_tail: (!failure.stderr_tail.is_empty()).then_some(failure.stderr_tail),
            exit_code: failure.exit_code,
            error: Some(failure.error.to_string()),
        }
    }
}

/// Result object of `start_generation`.
#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub success: bool,
    pub job_id: String,
    pub status: garmgen_core::job::JobStatus,
}

/// Result object of `list_generations`.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub jobs: Vec<JobSnapshot>,
}

// ---------------------------------------------------------------------------
// Synchronous generation
// ---------------------------------------------------------------------------

/// POST /api/v1/generation/generate
///
/// Runs the generator to completion, bounded by the configured timeout.
/// Validation failures are 400; every other outcome is a 200 result
/// object with `success` set accordingly.
pub async fn generate_garments(
    State(state): State<AppState>,
    Json(input): Json<GenerateRequest>,
) -> AppResult<impl IntoResponse> {
    match state.generator.generate(input.into_params()).await {
        Ok(outcome) => Ok(Json(GenerateResponse::from_outcome(outcome))),
        Err(failure) => {
            if matches!(failure.error, CoreError::Validation(_)) {
                return Err(AppError::Core(failure.error));
            }
            Ok(Json(GenerateResponse::from_failure(failure)))
        }
    }
}

// ---------------------------------------------------------------------------
// Asynchronous generation
// ---------------------------------------------------------------------------

/// POST /api/v1/generation/jobs
///
/// Enqueue a generation job and return its id immediately. Returns 201;
/// the job starts in `queued` status and is driven by a detached worker.
pub async fn start_generation(
    State(state): State<AppState>,
    Json(input): Json<GenerateRequest>,
) -> AppResult<impl IntoResponse> {
    let StartedJob { job_id, status } = state
        .generator
        .start(input.into_params())
        .map_err(AppError::Core)?;

    tracing::info!(job_id = %job_id, "Generation job submitted");

    Ok((
        StatusCode::CREATED,
        Json(StartResponse {
            success: true,
            job_id,
            status,
        }),
    ))
}

/// GET /api/v1/generation/jobs/{id}
///
/// Poll a job snapshot. `success` in the body is derived from the job
/// having reached `succeeded`; an unknown id is 404.
pub async fn get_generation(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let snapshot = state.generator.get(&job_id).map_err(AppError::Core)?;
    Ok(Json(snapshot))
}

/// GET /api/v1/generation/jobs
///
/// List all retained jobs, newest first.
pub async fn list_generations(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let jobs = state.generator.list();
    Ok(Json(ListResponse {
        success: true,
        jobs,
    }))
}
