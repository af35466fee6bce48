use std::path::PathBuf;
use std::time::Duration;

/// Generator orchestration configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development; override via
/// environment variables. Poll intervals are not env-mapped — they exist as
/// fields so tests can tighten them.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Explicit launcher path, replacing default launcher discovery.
    pub launcher_override: Option<PathBuf>,
    /// Project root: base for the default scratch directory and the
    /// native-library lookup directory.
    pub project_root: Option<PathBuf>,
    /// Preferred scratch directory override.
    pub tmp_dir_override: Option<PathBuf>,
    /// Wall-clock ceiling for the synchronous facade.
    pub sync_timeout: Duration,
    /// How long to wait for the hand-off file after a clean exit.
    pub result_wait: Duration,
    /// Granularity of the hand-off readiness poll.
    pub result_poll_interval: Duration,
    /// Granularity of the job worker's observability poll.
    pub worker_poll_interval: Duration,
    /// How long terminal job records are retained in the registry.
    pub job_ttl: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            launcher_override: None,
            project_root: None,
            tmp_dir_override: None,
            sync_timeout: Duration::from_secs(1200),
            result_wait: Duration::from_secs(10),
            result_poll_interval: Duration::from_millis(200),
            worker_poll_interval: Duration::from_millis(300),
            job_ttl: Duration::from_secs(3600),
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default |
    /// |-----------------------------|---------|
    /// | `GARMGEN_LAUNCHER`          | unset   |
    /// | `GARMGEN_PROJECT_ROOT`      | unset   |
    /// | `GARMGEN_TMP_DIR`           | unset   |
    /// | `GARMGEN_SYNC_TIMEOUT_SECS` | `1200`  |
    /// | `GARMGEN_RESULT_WAIT_SECS`  | `10`    |
    /// | `GARMGEN_JOB_TTL_SECS`      | `3600`  |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let launcher_override = std::env::var("GARMGEN_LAUNCHER").ok().map(PathBuf::from);
        let project_root = std::env::var("GARMGEN_PROJECT_ROOT").ok().map(PathBuf::from);
        let tmp_dir_override = std::env::var("GARMGEN_TMP_DIR").ok().map(PathBuf::from);

        let sync_timeout = env_secs("GARMGEN_SYNC_TIMEOUT_SECS", defaults.sync_timeout);
        let result_wait = env_secs("GARMGEN_RESULT_WAIT_SECS", defaults.result_wait);
        let job_ttl = env_secs("GARMGEN_JOB_TTL_SECS", defaults.job_ttl);

        Self {
            launcher_override,
            project_root,
            tmp_dir_override,
            sync_timeout,
            result_wait,
            job_ttl,
            ..defaults
        }
    }
}

/// Read a whole-seconds duration from `var`, falling back to `default` when
/// the variable is unset. A set-but-unparsable value fails fast.
fn env_secs(var: &str, default: Duration) -> Duration {
    match std::env::var(var) {
        Ok(raw) => {
            let secs: u64 = raw
                .parse()
                .unwrap_or_else(|_| panic!("{var} must be a valid u64"));
            Duration::from_secs(secs)
        }
        Err(_) => default,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
