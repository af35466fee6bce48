//! Scratch-directory resolution and unique hand-off path allocation.
//!
//! The generator reports results through files under a writable scratch
//! root resolved here. Resolution never fails: each candidate falls
//! through silently to the next, ending at the system temp directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::GeneratorConfig;

/// Resolve the preferred scratch directory.
///
/// Priority order:
/// 1. the configured override, if it exists or can be created;
/// 2. a `tmp` subdirectory under the configured project root, if creatable;
/// 3. the system default temp directory.
pub fn preferred_tmp_dir(config: &GeneratorConfig) -> PathBuf {
    if let Some(dir) = &config.tmp_dir_override {
        if ensure_dir(dir) {
            return dir.clone();
        }
    }
    if let Some(root) = &config.project_root {
        let dir = root.join("tmp");
        if ensure_dir(&dir) {
            return dir;
        }
    }
    std::env::temp_dir()
}

/// Allocate a uniquely named, empty `.json` hand-off file in the preferred
/// scratch directory and return its path.
///
/// The file is created with `create_new`, so concurrent callers can never
/// collide: a name clash simply retries with a fresh name.
pub fn make_tmp_json_path(config: &GeneratorConfig) -> io::Result<PathBuf> {
    let dir = preferred_tmp_dir(config);
    loop {
        let candidate = dir.join(format!("garmgen_{}.json", uuid::Uuid::new_v4().simple()));
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Return (creating if absent) the `jobs` subdirectory under the preferred
/// scratch directory — the root for per-job log directories.
pub fn jobs_dir(config: &GeneratorConfig) -> io::Result<PathBuf> {
    let dir = preferred_tmp_dir(config).join("jobs");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn ensure_dir(dir: &Path) -> bool {
    dir.is_dir() || fs::create_dir_all(dir).is_ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
