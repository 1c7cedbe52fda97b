//! Per-project log path computation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rr_core::sanitize::sanitize_project_path;

/// Compute `<logsRoot>/<sanitized-project-path>/<ISO-timestamp>[_<branch>].jsonl`,
/// creating parent directories.
pub fn open_log_path(
    logs_root: &Path,
    project_path: &str,
    branch: Option<&str>,
    timestamp: DateTime<Utc>,
) -> std::io::Result<PathBuf> {
    let project_dir = logs_root.join(sanitize_project_path(project_path));
    std::fs::create_dir_all(&project_dir)?;

    let stamp = timestamp.format("%Y%m%dT%H%M%S%.3fZ");
    let filename = match branch {
        Some(b) if !b.is_empty() => {
            format!("{stamp}_{}.jsonl", rr_core::sanitize::sanitize(b))
        }
        _ => format!("{stamp}.jsonl"),
    };
    Ok(project_dir.join(filename))
}
