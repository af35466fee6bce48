//! Launcher resolution and generator command construction.
//!
//! The external generator runs behind a launcher script that prepares its
//! own runtime. The orchestrator's only responsibilities are locating that
//! launcher and handing it a sanitized environment.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::GeneratorConfig;
use crate::error::CoreError;
use crate::job::JobParams;
use crate::tmpdir;

/// File name checked next to the orchestrator's own executable.
pub const LAUNCHER_SIBLING_NAME: &str = "garmgen-launcher.sh";

/// Command name searched on `PATH` as the last resort.
pub const LAUNCHER_PATH_NAME: &str = "garmgen-launcher";

/// Inherited variables with this prefix are stripped from the child
/// environment so the launcher's interpreter setup is not contaminated by
/// whichever package-manager environment started the server.
const CONFLICTING_ENV_PREFIX: &str = "CONDA_";

/// A fully resolved generator invocation: program, argument vector, and
/// the complete child environment block.
#[derive(Debug, Clone)]
pub struct GeneratorCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Locate the external launcher.
///
/// Checks, in order: the configured override, a sibling file next to the
/// current executable, then a `PATH` search. `None` is a reported
/// condition for the request, not a crash.
pub fn resolve_runner(config: &GeneratorConfig) -> Option<PathBuf> {
    if let Some(path) = &config.launcher_override {
        if path.is_file() {
            return Some(path.clone());
        }
    }

    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join(LAUNCHER_SIBLING_NAME);
            if sibling.is_file() {
                return Some(sibling);
            }
        }
    }

    find_in_path(LAUNCHER_PATH_NAME, env::var_os("PATH"))
}

/// Construct the argument vector and child environment for one generation
/// request, writing the hand-off JSON to `json_out_path`.
pub fn build_cmd_and_env(
    config: &GeneratorConfig,
    params: &JobParams,
    json_out_path: &Path,
) -> Result<GeneratorCommand, CoreError> {
    let program = resolve_runner(config).ok_or_else(|| {
        CoreError::LauncherNotFound(format!(
            "no launcher found; set GARMGEN_LAUNCHER or place {LAUNCHER_SIBLING_NAME} \
             next to the server binary"
        ))
    })?;

    let args = vec![
        "--size".to_string(),
        params.count.to_string(),
        "--name".to_string(),
        format!("{}_{}", params.name_prefix, params.garment_type),
        "--json_output_path".to_string(),
        json_out_path.to_string_lossy().into_owned(),
    ];

    let env = build_child_env(config, env::vars());

    Ok(GeneratorCommand { program, args, env })
}

/// Derive the child environment from `inherited`.
///
/// - `CONDA_*` variables are stripped.
/// - Text encoding is forced to UTF-8.
/// - Temp-directory variables are redirected to the preferred scratch dir.
/// - `<project_root>/lib`, when present, is prepended to `PATH` for native
///   library lookup.
pub fn build_child_env(
    config: &GeneratorConfig,
    inherited: impl Iterator<Item = (String, String)>,
) -> Vec<(String, String)> {
    let tmp = tmpdir::preferred_tmp_dir(config)
        .to_string_lossy()
        .into_owned();

    let mut env: Vec<(String, String)> = inherited
        .filter(|(name, _)| !name.starts_with(CONFLICTING_ENV_PREFIX))
        .collect();

    set_var(&mut env, "PYTHONIOENCODING", "utf-8");
    set_var(&mut env, "PYTHONUTF8", "1");
    set_var(&mut env, "TMPDIR", &tmp);
    set_var(&mut env, "TMP", &tmp);
    set_var(&mut env, "TEMP", &tmp);

    if let Some(root) = &config.project_root {
        let lib_dir = root.join("lib");
        if lib_dir.is_dir() {
            let current = env
                .iter()
                .find(|(name, _)| name == "PATH")
                .map(|(_, value)| value.clone())
                .unwrap_or_default();

            let mut parts = vec![lib_dir];
            parts.extend(env::split_paths(&current));
            if let Ok(joined) = env::join_paths(parts) {
                set_var(&mut env, "PATH", &joined.to_string_lossy());
            }
        }
    }

    env
}

/// Search a `PATH`-style variable for an existing file named `name`.
fn find_in_path(name: &str, path_var: Option<OsString>) -> Option<PathBuf> {
    let path_var = path_var?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn set_var(env: &mut Vec<(String, String)>, name: &str, value: &str) {
    match env.iter_mut().find(|(existing, _)| existing == name) {
        Some((_, existing)) => *existing = value.to_string(),
        None => env.push((name.to_string(), value.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
