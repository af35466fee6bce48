//! Job data model and the in-memory registry.
//!
//! A single mutex guards the registry map. The lock is held only for the
//! duration of a field update or snapshot copy — never across subprocess
//! I/O or filesystem waits — so pollers are never blocked behind a
//! long-running generator. Exactly one worker drives a given record to a
//! terminal state; terminal states are absorbing.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;

use crate::error::CoreError;

/// Inclusive bounds on the garment count of a single request.
pub const MIN_COUNT: u32 = 1;
pub const MAX_COUNT: u32 = 100;

/// Lines of captured output retained on a terminal job record.
pub const OUTPUT_TAIL_LINES: usize = 100;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a generation job.
///
/// Transitions are strictly `queued → running → {succeeded | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// The original request parameters, immutable once set.
#[derive(Debug, Clone, Serialize)]
pub struct JobParams {
    pub count: u32,
    pub garment_type: String,
    pub name_prefix: String,
}

impl JobParams {
    /// Validate the request. Fails fast before anything is spawned.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.count < MIN_COUNT || self.count > MAX_COUNT {
            return Err(CoreError::Validation(format!(
                "count must be between {MIN_COUNT} and {MAX_COUNT}, got {}",
                self.count
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Record & snapshot
// ---------------------------------------------------------------------------

/// One generation request tracked by id through its lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    #[serde(rename = "job_id")]
    pub id: String,
    pub status: JobStatus,
    pub params: JobParams,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Best-effort hand-off observability, refreshed each worker poll cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmp_json_path: Option<String>,
    pub tmp_json_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmp_json_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmp_json_mtime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout_log_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_log_bytes: Option<u64>,

    /// Last [`OUTPUT_TAIL_LINES`] lines of each stream, set at terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout_tail: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_tail: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Cleanup failures surfaced instead of swallowed; never mask the
    /// primary result.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl JobRecord {
    fn new(id: String, params: JobParams) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            params,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            tmp_json_path: None,
            tmp_json_exists: false,
            tmp_json_size: None,
            tmp_json_mtime: None,
            stdout_log_bytes: None,
            stderr_log_bytes: None,
            stdout_tail: None,
            stderr_tail: None,
            dataset_path: None,
            error: None,
            exit_code: None,
            warnings: Vec::new(),
        }
    }
}

/// Final output tails, committed together with the terminal transition so
/// a poller never observes tails on a non-terminal record.
#[derive(Debug, Clone, Default)]
pub struct JobTails {
    pub stdout: Option<Vec<String>>,
    pub stderr: Option<Vec<String>>,
}

/// A point-in-time copy of a job record handed to pollers, so the live,
/// lock-protected record is never exposed.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    /// Derived: `status == succeeded`.
    pub success: bool,
    #[serde(flatten)]
    pub record: JobRecord,
    /// Seconds since the job started; freshly computed for in-progress
    /// jobs, frozen at the terminal duration otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_sec: Option<f64>,
}

impl JobSnapshot {
    fn of(record: &JobRecord) -> Self {
        let end = if record.status.is_terminal() {
            record.completed_at
        } else {
            Some(Utc::now())
        };
        let elapsed_sec = match (record.started_at, end) {
            (Some(start), Some(end)) => {
                Some((end - start).num_milliseconds().max(0) as f64 / 1000.0)
            }
            _ => None,
        };

        Self {
            success: record.status == JobStatus::Succeeded,
            record: record.clone(),
            elapsed_sec,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// In-memory job registry: id → record, guarded by a single lock.
///
/// Terminal records older than `terminal_ttl` are evicted lazily on
/// insert, bounding registry growth in a long-lived service. Live records
/// are never evicted.
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JobRecord>>,
    terminal_ttl: Duration,
}

impl JobRegistry {
    pub fn new(terminal_ttl: Duration) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            terminal_ttl,
        }
    }

    /// Create a `queued` record under a fresh id and return the id.
    pub fn insert(&self, params: JobParams) -> String {
        let id = new_job_id();
        let record = JobRecord::new(id.clone(), params);

        let mut jobs = self.jobs.lock().expect("registry lock poisoned");
        let ttl = chrono::Duration::from_std(self.terminal_ttl)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let now = Utc::now();
        jobs.retain(|_, r| {
            !r.status.is_terminal()
                || r.completed_at.is_none_or(|done| now - done < ttl)
        });
        jobs.insert(id.clone(), record);
        id
    }

    /// Snapshot a record by id.
    pub fn snapshot(&self, id: &str) -> Option<JobSnapshot> {
        let jobs = self.jobs.lock().expect("registry lock poisoned");
        jobs.get(id).map(JobSnapshot::of)
    }

    /// Snapshot every retained record, newest first.
    pub fn list(&self) -> Vec<JobSnapshot> {
        let jobs = self.jobs.lock().expect("registry lock poisoned");
        let mut snapshots: Vec<JobSnapshot> = jobs.values().map(JobSnapshot::of).collect();
        snapshots.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at));
        snapshots
    }

    /// `queued → running`, recording `started_at`. No-op from any other
    /// state.
    pub fn mark_running(&self, id: &str) {
        self.update(id, |record| {
            if record.status == JobStatus::Queued {
                record.status = JobStatus::Running;
                record.started_at = Some(Utc::now());
            }
        });
    }

    /// `running → succeeded`, recording the dataset path, the final output
    /// tails, and `completed_at` in one commit. No-op once terminal.
    pub fn finish_success(&self, id: &str, dataset_path: String, tails: JobTails) {
        self.update(id, |record| {
            if record.status.is_terminal() {
                return;
            }
            record.status = JobStatus::Succeeded;
            record.dataset_path = Some(dataset_path);
            record.stdout_tail = tails.stdout;
            record.stderr_tail = tails.stderr;
            record.completed_at = Some(Utc::now());
        });
    }

    /// `running → failed`, recording the error, the generator exit code
    /// where applicable, and the final output tails in one commit. No-op
    /// once terminal.
    pub fn finish_failure(&self, id: &str, error: String, exit_code: Option<i32>, tails: JobTails) {
        self.update(id, |record| {
            if record.status.is_terminal() {
                return;
            }
            record.status = JobStatus::Failed;
            record.error = Some(error);
            record.exit_code = exit_code;
            record.stdout_tail = tails.stdout;
            record.stderr_tail = tails.stderr;
            record.completed_at = Some(Utc::now());
        });
    }

    /// Record the allocated hand-off path on the record.
    pub fn set_tmp_json_path(&self, id: &str, path: String) {
        self.update(id, |record| record.tmp_json_path = Some(path));
    }

    /// Refresh the observability snapshot: hand-off file existence, size,
    /// and mtime plus captured-log sizes. Probed by the worker outside the
    /// lock; this only commits the values.
    pub fn set_observability(
        &self,
        id: &str,
        tmp_json_exists: bool,
        tmp_json_size: Option<u64>,
        tmp_json_mtime: Option<DateTime<Utc>>,
        stdout_log_bytes: Option<u64>,
        stderr_log_bytes: Option<u64>,
    ) {
        self.update(id, |record| {
            record.tmp_json_exists = tmp_json_exists;
            record.tmp_json_size = tmp_json_size;
            record.tmp_json_mtime = tmp_json_mtime;
            record.stdout_log_bytes = stdout_log_bytes;
            record.stderr_log_bytes = stderr_log_bytes;
        });
    }

    /// Append a structured cleanup warning to the record.
    pub fn push_warning(&self, id: &str, warning: String) {
        self.update(id, |record| record.warnings.push(warning));
    }

    fn update<F: FnOnce(&mut JobRecord)>(&self, id: &str, f: F) -> bool {
        let mut jobs = self.jobs.lock().expect("registry lock poisoned");
        match jobs.get_mut(id) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        }
    }
}

/// Generate a 64-hex job id from 32 random bytes.
fn new_job_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
