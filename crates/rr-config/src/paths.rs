//! XDG-rooted path resolution for config, logs, and lock state, following
//! the `csa-config::paths` convention: a canonical path for
//! writes, with a fallback read path kept for the new/legacy pair the
//! ambient config contract mandates, plus environment overrides for tests.

use std::path::PathBuf;

pub const APP_NAME: &str = "ralph-review";
pub const LEGACY_APP_NAME: &str = "ralph";

pub const LOGS_ROOT_ENV: &str = "RALPH_REVIEW_LOGS_ROOT";
pub const STATE_ROOT_ENV: &str = "RALPH_REVIEW_STATE_ROOT";
pub const CONFIG_PATH_ENV: &str = "RALPH_REVIEW_CONFIG";

fn project_dirs(app_name: &str) -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", app_name)
}

fn choose_read_path(new_path: PathBuf, legacy_path: PathBuf) -> PathBuf {
    if new_path.exists() {
        new_path
    } else if legacy_path.exists() {
        legacy_path
    } else {
        new_path
    }
}

fn effective_uid() -> u32 {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and always succeeds.
        unsafe { libc::geteuid() }
    }
    #[cfg(not(unix))]
    {
        0
    }
}

/// Canonical config file path for reads: `RALPH_REVIEW_CONFIG` if set, else
/// `{config_dir}/config.toml` preferring the new app name over the legacy one.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    let new_dir = project_dirs(APP_NAME)?.config_dir().to_path_buf();
    let legacy_dir = project_dirs(LEGACY_APP_NAME)?.config_dir().to_path_buf();
    Some(choose_read_path(new_dir, legacy_dir).join("config.toml"))
}

/// `{data_dir}/logs`, overridable by `RALPH_REVIEW_LOGS_ROOT`.
pub fn logs_root() -> PathBuf {
    if let Ok(path) = std::env::var(LOGS_ROOT_ENV) {
        return PathBuf::from(path);
    }
    let new_dir = project_dirs(APP_NAME).map(|d| d.data_dir().join("logs"));
    let legacy_dir = project_dirs(LEGACY_APP_NAME).map(|d| d.data_dir().join("logs"));
    match (new_dir, legacy_dir) {
        (Some(new_dir), Some(legacy_dir)) => choose_read_path(new_dir, legacy_dir),
        (Some(new_dir), None) => new_dir,
        _ => std::env::temp_dir().join(APP_NAME).join("logs"),
    }
}

/// `{runtime_dir}/locks` (falling back to the local data dir if no runtime
/// dir is available, matching `csa-config`'s state-dir resolution),
/// overridable by `RALPH_REVIEW_STATE_ROOT`.
pub fn state_root() -> PathBuf {
    if let Ok(path) = std::env::var(STATE_ROOT_ENV) {
        return PathBuf::from(path);
    }
    let runtime_root = std::env::var("XDG_RUNTIME_DIR").ok();
    let uid = effective_uid();
    let new_dir = match &runtime_root {
        Some(root) => PathBuf::from(root).join(APP_NAME),
        None => project_dirs(APP_NAME)
            .map(|d| d.data_local_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("/tmp").join(format!("{APP_NAME}-{uid}"))),
    };
    new_dir.join("locks")
}
