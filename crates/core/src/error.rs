use std::time::Duration;

/// Domain-level error type for the generation orchestration layer.
///
/// Every failure mode of a generation request maps to exactly one variant,
/// so callers (and the HTTP adapter) can report a structured result instead
/// of a crash. A job worker converts any of these into a terminal `failed`
/// record; none of them may leave a job stuck in `running`.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The requested entity does not exist in the registry.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Request parameters failed validation. Nothing is spawned.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The external launcher could not be located.
    #[error("Generator launcher not found: {0}")]
    LauncherNotFound(String),

    /// The generator exceeded the synchronous wall-clock ceiling and was
    /// killed.
    #[error("Generator timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },

    /// The generator exited with a non-zero exit code. No retry.
    #[error("Generator failed with exit code {exit_code}: {stderr_tail}")]
    SubprocessFailed { exit_code: i32, stderr_tail: String },

    /// The generator exited cleanly but the hand-off file never became
    /// readable within the wait budget.
    #[error("Generator result not ready: {0}")]
    ResultNotReady(String),

    /// An I/O error occurred while orchestrating the generator.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other unexpected orchestration failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The generator exit code carried by this error, if any.
    ///
    /// `ResultNotReady` only arises after a clean exit, so it reports `0`:
    /// a child that lied about success, not one that crashed.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::SubprocessFailed { exit_code, .. } => Some(*exit_code),
            Self::ResultNotReady(_) => Some(0),
            _ => None,
        }
    }

    /// Build a [`CoreError::Timeout`] from an elapsed duration.
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout {
            elapsed_secs: elapsed.as_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
