//! Shared subprocess execution for the synchronous facade.
//!
//! Spawns the launcher with piped output, drains both streams in spawned
//! tasks (capped), and enforces the wall-clock ceiling.
//! `kill_on_drop(true)` ensures a timed-out launcher is killed rather
//! than orphaned.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::CoreError;
use crate::launcher::GeneratorCommand;

/// Maximum stdout or stderr size captured per stream (10 MiB). Output
/// beyond this is truncated to bound memory against a verbose generator.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Captured output of a completed generator run.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

/// Run `command` to completion with piped output, bounded by `timeout`.
///
/// The child environment is exactly `command.env`; nothing else leaks in.
pub async fn run_to_completion(
    command: &GeneratorCommand,
    timeout: Duration,
) -> Result<ProcessOutput, CoreError> {
    let mut cmd = tokio::process::Command::new(&command.program);
    cmd.args(&command.args)
        .env_clear()
        .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd.spawn()?;

    // Drain both streams in spawned tasks so `child.wait()` can proceed.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let stdout_bytes = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();
            Ok(ProcessOutput {
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                exit_code: status.code().unwrap_or(-1),
                duration: start.elapsed(),
            })
        }
        Ok(Err(e)) => Err(CoreError::Io(e)),
        // `child` is dropped here; kill_on_drop terminates the generator.
        Err(_elapsed) => Err(CoreError::timeout(start.elapsed())),
    }
}

/// Return the last `n` lines of `text`, oldest first.
pub fn tail_lines(text: &str, n: usize) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].iter().map(|s| s.to_string()).collect()
}

/// Read an entire output stream, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
