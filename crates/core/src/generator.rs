//! Synchronous and asynchronous generation facades.
//!
//! [`GeneratorService`] is the single entry point the transport layer
//! talks to. The synchronous facade blocks until the generator finishes
//! (bounded by the configured ceiling); the asynchronous facade enqueues
//! a job, spawns a detached worker, and returns immediately.

use std::sync::Arc;

use serde::Serialize;

use crate::config::GeneratorConfig;
use crate::error::CoreError;
use crate::handoff;
use crate::job::{JobParams, JobRegistry, JobSnapshot, JobStatus, OUTPUT_TAIL_LINES};
use crate::launcher;
use crate::subprocess::{self, tail_lines};
use crate::tmpdir;
use crate::worker;

/// Lines of generator stdout echoed back as `logs` on a synchronous
/// success.
const SUCCESS_LOG_LINES: usize = 10;

/// Result of a successful synchronous generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub dataset_path: String,
    pub generated_count: u32,
    pub garment_type: String,
    pub logs: Vec<String>,
    pub stdout_tail: Vec<String>,
    pub stderr_tail: Vec<String>,
    pub message: String,
}

/// A failed synchronous generation: the structured error plus whatever
/// output was captured before things went wrong.
#[derive(Debug)]
pub struct GenerationFailure {
    pub error: CoreError,
    pub exit_code: Option<i32>,
    pub stdout_tail: Vec<String>,
    pub stderr_tail: Vec<String>,
}

impl From<CoreError> for GenerationFailure {
    fn from(error: CoreError) -> Self {
        let exit_code = error.exit_code();
        Self {
            error,
            exit_code,
            stdout_tail: Vec::new(),
            stderr_tail: Vec::new(),
        }
    }
}

/// Receipt for an accepted asynchronous job.
#[derive(Debug, Clone, Serialize)]
pub struct StartedJob {
    pub job_id: String,
    pub status: JobStatus,
}

/// The public generation surface composing registry, worker, and
/// subprocess primitives.
pub struct GeneratorService {
    config: Arc<GeneratorConfig>,
    registry: Arc<JobRegistry>,
}

impl GeneratorService {
    pub fn new(config: GeneratorConfig) -> Self {
        let registry = Arc::new(JobRegistry::new(config.job_ttl));
        Self {
            config: Arc::new(config),
            registry,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Whether launcher discovery currently succeeds. Used by health
    /// reporting; requests re-resolve on their own.
    pub fn launcher_resolved(&self) -> bool {
        launcher::resolve_runner(&self.config).is_some()
    }

    // -----------------------------------------------------------------
    // Synchronous facade
    // -----------------------------------------------------------------

    /// Run one generation to completion, bounded by the configured
    /// timeout. The hand-off file is removed on every exit path.
    pub async fn generate(
        &self,
        params: JobParams,
    ) -> Result<GenerationOutcome, GenerationFailure> {
        params.validate()?;

        let json_path = tmpdir::make_tmp_json_path(&self.config).map_err(CoreError::Io)?;
        let result = self.run_sync(&params, &json_path).await;

        if let Some(warning) = handoff::remove_handoff(&json_path) {
            tracing::warn!(warning = %warning, "Hand-off cleanup failed");
        }

        result
    }

    async fn run_sync(
        &self,
        params: &JobParams,
        json_path: &std::path::Path,
    ) -> Result<GenerationOutcome, GenerationFailure> {
        let command = launcher::build_cmd_and_env(&self.config, params, json_path)?;

        let output = subprocess::run_to_completion(&command, self.config.sync_timeout).await?;

        let stdout_tail = tail_lines(&output.stdout, OUTPUT_TAIL_LINES);
        let stderr_tail = tail_lines(&output.stderr, OUTPUT_TAIL_LINES);

        if output.exit_code != 0 {
            return Err(GenerationFailure {
                error: CoreError::SubprocessFailed {
                    exit_code: output.exit_code,
                    stderr_tail: tail_lines(&output.stderr, 5).join("\n"),
                },
                exit_code: Some(output.exit_code),
                stdout_tail,
                stderr_tail,
            });
        }

        let result = handoff::read_json_with_wait(
            json_path,
            self.config.result_wait,
            self.config.result_poll_interval,
        )
        .await
        .map_err(|error| GenerationFailure {
            error,
            exit_code: Some(0),
            stdout_tail: stdout_tail.clone(),
            stderr_tail: stderr_tail.clone(),
        })?;

        tracing::info!(
            dataset_path = %result.dataset_path,
            count = params.count,
            duration_ms = output.duration.as_millis() as u64,
            "Generation finished",
        );

        Ok(GenerationOutcome {
            dataset_path: result.dataset_path,
            generated_count: result.generated_count.unwrap_or(params.count),
            garment_type: params.garment_type.clone(),
            logs: tail_lines(&output.stdout, SUCCESS_LOG_LINES),
            stdout_tail,
            stderr_tail,
            message: format!("Generated {} garments", params.count),
        })
    }

    // -----------------------------------------------------------------
    // Asynchronous facade
    // -----------------------------------------------------------------

    /// Validate, enqueue a `queued` record, and spawn a detached worker.
    /// Returns immediately; progress is observed via [`Self::get`].
    pub fn start(&self, params: JobParams) -> Result<StartedJob, CoreError> {
        params.validate()?;

        let job_id = self.registry.insert(params);
        tokio::spawn(worker::run_job(
            Arc::clone(&self.registry),
            Arc::clone(&self.config),
            job_id.clone(),
        ));

        tracing::info!(job_id = %job_id, "Generation job queued");
        Ok(StartedJob {
            job_id,
            status: JobStatus::Queued,
        })
    }

    /// Snapshot a job by id.
    pub fn get(&self, job_id: &str) -> Result<JobSnapshot, CoreError> {
        self.registry
            .snapshot(job_id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "Job",
                id: job_id.to_string(),
            })
    }

    /// Snapshot all retained jobs, newest first.
    pub fn list(&self) -> Vec<JobSnapshot> {
        self.registry.list()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
