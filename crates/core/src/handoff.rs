//! Hand-off file reading.
//!
//! The generator reports its result through a JSON file whose write
//! completion is not signalled — no lock file, no atomic-rename contract.
//! Readiness is inferred from existence plus non-zero size, and parse
//! failures are retried until the deadline in case the file was caught
//! mid-write.

use std::io;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use crate::error::CoreError;

/// The structured result the generator writes to the hand-off file.
///
/// `dataset_path` is the only guaranteed field; anything else the
/// generator includes is tolerated and ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct HandoffResult {
    pub dataset_path: String,
    #[serde(default)]
    pub generated_count: Option<u32>,
}

/// Poll `path` until it exists with non-zero size and parses, retrying at
/// `poll_interval` granularity for up to `max_wait`.
///
/// When the deadline elapses the last parse/IO observation is reported in
/// a [`CoreError::ResultNotReady`].
pub async fn read_json_with_wait(
    path: &Path,
    max_wait: Duration,
    poll_interval: Duration,
) -> Result<HandoffResult, CoreError> {
    let deadline = Instant::now() + max_wait;
    let mut last_observation;

    loop {
        last_observation = match try_read(path).await {
            Ok(result) => return Ok(result),
            Err(observation) => observation,
        };

        if Instant::now() >= deadline {
            return Err(CoreError::ResultNotReady(format!(
                "hand-off file {} not readable within {}s ({last_observation})",
                path.display(),
                max_wait.as_secs_f64(),
            )));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// One readiness probe. The error string describes what was observed so
/// the final not-ready report can carry it.
async fn try_read(path: &Path) -> Result<HandoffResult, String> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => "file does not exist".to_string(),
            _ => format!("stat failed: {e}"),
        })?;

    if meta.len() == 0 {
        return Err("file is empty".to_string());
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("read failed: {e}"))?;

    serde_json::from_slice(&bytes).map_err(|e| format!("invalid JSON: {e}"))
}

/// Best-effort hand-off removal. An already-absent file is fine; any other
/// failure is returned as a warning string instead of being swallowed.
pub fn remove_handoff(path: &Path) -> Option<String> {
    match std::fs::remove_file(path) {
        Ok(()) => None,
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => Some(format!(
            "failed to remove hand-off file {}: {e}",
            path.display()
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
