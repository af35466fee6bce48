//! Per-job background worker.
//!
//! One worker owns one job record from `running` to a terminal state. The
//! registry lock is taken only for short field commits; the launcher runs
//! and is observed entirely outside the lock. Whatever goes wrong, the
//! record always reaches a terminal state — a job never hangs in
//! `running`.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;

use crate::config::GeneratorConfig;
use crate::error::CoreError;
use crate::handoff;
use crate::job::{JobParams, JobRegistry, JobTails, OUTPUT_TAIL_LINES};
use crate::launcher;
use crate::subprocess::tail_lines;
use crate::tmpdir;

/// Drive the job with id `job_id` to completion.
///
/// Spawned as a detached task by the asynchronous facade; returns only
/// once the record is terminal.
pub async fn run_job(registry: Arc<JobRegistry>, config: Arc<GeneratorConfig>, job_id: String) {
    registry.mark_running(&job_id);
    tracing::info!(job_id = %job_id, "Generation job started");

    let (result, tails) = execute(&registry, &config, &job_id).await;
    match result {
        Ok(dataset_path) => {
            tracing::info!(job_id = %job_id, dataset_path = %dataset_path, "Generation job succeeded");
            registry.finish_success(&job_id, dataset_path, tails);
        }
        Err(e) => {
            tracing::warn!(job_id = %job_id, error = %e, "Generation job failed");
            registry.finish_failure(&job_id, e.to_string(), e.exit_code(), tails);
        }
    }
}

/// Allocate the hand-off path, run the launcher, and read the result.
///
/// The hand-off file is removed on every path out of this function;
/// removal failures are surfaced as record warnings. The collected output
/// tails are returned alongside the result so the caller can commit them
/// with the terminal transition.
async fn execute(
    registry: &JobRegistry,
    config: &GeneratorConfig,
    job_id: &str,
) -> (Result<String, CoreError>, JobTails) {
    let mut tails = JobTails::default();

    let Some(snapshot) = registry.snapshot(job_id) else {
        let err = CoreError::Internal(format!("job {job_id} vanished from registry"));
        return (Err(err), tails);
    };
    let params = snapshot.record.params;

    let json_path = match tmpdir::make_tmp_json_path(config) {
        Ok(path) => path,
        Err(e) => return (Err(CoreError::Io(e)), tails),
    };
    registry.set_tmp_json_path(job_id, json_path.to_string_lossy().into_owned());

    let result =
        run_with_handoff(registry, config, job_id, &params, &json_path, &mut tails).await;

    if let Some(warning) = handoff::remove_handoff(&json_path) {
        registry.push_warning(job_id, warning);
    }

    (result, tails)
}

async fn run_with_handoff(
    registry: &JobRegistry,
    config: &GeneratorConfig,
    job_id: &str,
    params: &JobParams,
    json_path: &Path,
    tails: &mut JobTails,
) -> Result<String, CoreError> {
    let command = launcher::build_cmd_and_env(config, params, json_path)?;

    let log_dir = tmpdir::jobs_dir(config)?.join(job_id);
    std::fs::create_dir_all(&log_dir)?;
    let stdout_log = log_dir.join("stdout.log");
    let stderr_log = log_dir.join("stderr.log");

    let status = spawn_and_poll(
        registry, config, job_id, &command, json_path, &stdout_log, &stderr_log,
    )
    .await?;

    tails.stdout = read_tail(&stdout_log);
    tails.stderr = read_tail(&stderr_log);

    if !status.success() {
        let exit_code = status.code().unwrap_or(-1);
        // The full tails live on the record; the error string only carries
        // the last few stderr lines.
        let stderr_tail = tails
            .stderr
            .as_deref()
            .map(|lines| lines[lines.len().saturating_sub(5)..].join("\n"))
            .unwrap_or_default();
        return Err(CoreError::SubprocessFailed {
            exit_code,
            stderr_tail,
        });
    }

    let result =
        handoff::read_json_with_wait(json_path, config.result_wait, config.result_poll_interval)
            .await?;
    Ok(result.dataset_path)
}

/// Spawn the launcher with its output redirected to per-job log files and
/// poll it at the configured interval until exit.
///
/// Log files instead of pipes: a long-running generator must never block
/// on a full pipe buffer. Each tick refreshes the record's observability
/// fields for external pollers; nothing here is a control decision.
async fn spawn_and_poll(
    registry: &JobRegistry,
    config: &GeneratorConfig,
    job_id: &str,
    command: &launcher::GeneratorCommand,
    json_path: &Path,
    stdout_log: &Path,
    stderr_log: &Path,
) -> Result<std::process::ExitStatus, CoreError> {
    let stdout_file = std::fs::File::create(stdout_log)?;
    let stderr_file = std::fs::File::create(stderr_log)?;

    let mut cmd = tokio::process::Command::new(&command.program);
    cmd.args(&command.args)
        .env_clear()
        .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::from(stderr_file))
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;

    let mut ticker = tokio::time::interval(config.worker_poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        refresh_observability(registry, job_id, json_path, stdout_log, stderr_log);

        if let Some(status) = child.try_wait()? {
            refresh_observability(registry, job_id, json_path, stdout_log, stderr_log);
            return Ok(status);
        }
    }
}

/// Probe the hand-off file and log sizes (outside the lock), then commit
/// the snapshot to the record.
fn refresh_observability(
    registry: &JobRegistry,
    job_id: &str,
    json_path: &Path,
    stdout_log: &Path,
    stderr_log: &Path,
) {
    let (exists, size, mtime) = probe_file(json_path);
    registry.set_observability(
        job_id,
        exists,
        size,
        mtime,
        file_len(stdout_log),
        file_len(stderr_log),
    );
}

fn probe_file(path: &Path) -> (bool, Option<u64>, Option<DateTime<Utc>>) {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let mtime = meta.modified().ok().map(DateTime::<Utc>::from);
            (true, Some(meta.len()), mtime)
        }
        Err(_) => (false, None, None),
    }
}

fn file_len(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

/// Last [`OUTPUT_TAIL_LINES`] lines of a log file, if readable.
fn read_tail(path: &Path) -> Option<Vec<String>> {
    std::fs::read_to_string(path)
        .ok()
        .map(|text| tail_lines(&text, OUTPUT_TAIL_LINES))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
