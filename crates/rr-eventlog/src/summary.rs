//! Derives the rebuildable `SessionSummary` sidecar from a log's entries.

use std::path::{Path, PathBuf};

use chrono::Utc;

use rr_core::types::{
    IterationError, LogEntry, PriorityCounts, SessionStatus, SessionSummary,
    SESSION_SUMMARY_SCHEMA_VERSION,
};

use crate::reader::read_all;

/// Rebuild the summary sidecar for the log at `log_path` and write it
/// atomically alongside the log, returning the computed summary.
pub fn rebuild_summary(log_path: &Path) -> std::io::Result<SessionSummary> {
    let entries = read_all(log_path)?;
    let summary = fold_entries(log_path, &entries);
    write_atomic(&sidecar_path(log_path), &summary)?;
    Ok(summary)
}

fn sidecar_path(log_path: &Path) -> PathBuf {
    let stem = log_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    log_path.with_file_name(format!("{stem}.summary.json"))
}

fn fold_entries(log_path: &Path, entries: &[LogEntry]) -> SessionSummary {
    let mut iterations = 0u32;
    let mut total_fixes = 0u32;
    let mut total_skipped = 0u32;
    let mut priority_counts = PriorityCounts::default();
    let mut rollback_count = 0u32;
    let mut rollback_failures = 0u32;
    let mut total_duration_ms = 0u64;
    let mut stop_iteration: Option<bool> = None;
    let mut last_error: Option<IterationError> = None;
    let mut interrupted_error: Option<IterationError> = None;
    let mut has_iteration = false;

    let mut project_path = String::new();
    let mut git_branch = None;

    let mut session_end: Option<(SessionStatus, String, u32)> = None;

    for entry in entries {
        match entry {
            LogEntry::System {
                project_path: p,
                branch,
                ..
            } => {
                project_path = p.clone();
                git_branch = branch.clone();
            }
            LogEntry::Iteration {
                wall_duration_ms,
                fix_summary,
                error,
                rollback,
                ..
            } => {
                has_iteration = true;
                iterations += 1;
                total_duration_ms += wall_duration_ms;

                if let Some(fix_summary) = fix_summary {
                    total_fixes += fix_summary.fixes.len() as u32;
                    total_skipped += fix_summary.skipped.len() as u32;
                    stop_iteration = Some(fix_summary.stop_iteration);
                    for fix in &fix_summary.fixes {
                        tally_priority(&mut priority_counts, fix.priority);
                    }
                }

                if let Some(rollback) = rollback {
                    if rollback.attempted {
                        rollback_count += 1;
                        if !rollback.success {
                            rollback_failures += 1;
                        }
                    }
                }

                if let Some(error) = error {
                    last_error = Some(error.clone());
                    if interrupted_error.is_none() && looks_like_interrupt(&error.message) {
                        interrupted_error = Some(error.clone());
                    }
                }
            }
            LogEntry::SessionEnd {
                status,
                reason,
                iterations: n,
            } => {
                session_end = Some((*status, reason.clone(), *n));
            }
        }
    }

    let (status, reason) = derive_status(&session_end, &interrupted_error, &last_error, has_iteration);

    SessionSummary {
        schema_version: SESSION_SUMMARY_SCHEMA_VERSION,
        log_path: log_path.to_string_lossy().into_owned(),
        status,
        iterations: session_end.as_ref().map(|(_, _, n)| *n).unwrap_or(iterations),
        total_fixes,
        total_skipped,
        priority_counts,
        rollback_count,
        rollback_failures,
        total_duration_ms: if has_iteration {
            Some(total_duration_ms)
        } else {
            None
        },
        stop_iteration,
        has_iteration,
        ended_at: if session_end.is_some() {
            Some(Utc::now())
        } else {
            None
        },
        reason,
        project_path,
        git_branch,
    }
}

fn tally_priority(counts: &mut PriorityCounts, priority: rr_core::types::Priority) {
    use rr_core::types::Priority;
    match priority {
        Priority::P0 => counts.p0 += 1,
        Priority::P1 => counts.p1 += 1,
        Priority::P2 => counts.p2 += 1,
        Priority::P3 => counts.p3 += 1,
    }
}

/// The authoritative status-derivation table: a terminal `session_end`
/// entry wins outright; otherwise **any** iteration with an interrupt-worded
/// error beats a plain error regardless of log order, which beats
/// "completed if at least one iteration ran", which beats `unknown`.
fn derive_status(
    session_end: &Option<(SessionStatus, String, u32)>,
    interrupted_error: &Option<IterationError>,
    last_error: &Option<IterationError>,
    has_iteration: bool,
) -> (SessionStatus, Option<String>) {
    if let Some((status, reason, _)) = session_end {
        return (*status, Some(reason.clone()));
    }
    if let Some(error) = interrupted_error {
        return (SessionStatus::Interrupted, Some(error.message.clone()));
    }
    if let Some(error) = last_error {
        return (SessionStatus::Failed, Some(error.message.clone()));
    }
    if has_iteration {
        return (SessionStatus::Completed, None);
    }
    (SessionStatus::Unknown, None)
}

fn looks_like_interrupt(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("interrupt") || lowered.contains("sigint") || lowered.contains("sigterm")
}

fn write_atomic(path: &Path, summary: &SessionSummary) -> std::io::Result<()> {
    let tmp_path = path.with_extension(format!("json.tmp.{}", std::process::id()));
    let body = serde_json::to_vec_pretty(summary)?;
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        use std::io::Write;
        file.write_all(&body)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
