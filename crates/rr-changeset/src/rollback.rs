//! Restores a project's working tree to the state captured by a
//! [`ChangeSet`]'s rollback anchor. Never fails silently: every path
//! through this function returns a [`RollbackOutcome`] describing exactly
//! what happened, even when restoration only partially succeeds.

use std::path::Path;

use rr_core::types::{ChangeSet, ChangeSetMode, RollbackOutcome};

use crate::anchor::UncommittedAnchor;
use crate::git;

pub fn rollback(project_path: &Path, change_set: &ChangeSet) -> RollbackOutcome {
    let Some(anchor) = change_set.rollback_anchor.as_deref() else {
        return RollbackOutcome {
            attempted: false,
            success: true,
            reason: Some("no rollback anchor recorded for this mode".to_string()),
        };
    };

    match change_set.mode {
        ChangeSetMode::Uncommitted => rollback_uncommitted(project_path, anchor),
        ChangeSetMode::Base | ChangeSetMode::Commit => rollback_to_sha(project_path, anchor),
        ChangeSetMode::Custom => RollbackOutcome {
            attempted: false,
            success: true,
            reason: Some("custom mode carries no rollback anchor".to_string()),
        },
    }
}

fn rollback_to_sha(project_path: &Path, sha: &str) -> RollbackOutcome {
    match git::run(project_path, &["reset", "--hard", sha]) {
        Ok(output) if output.status.success() => RollbackOutcome {
            attempted: true,
            success: true,
            reason: None,
        },
        Ok(output) => RollbackOutcome {
            attempted: true,
            success: false,
            reason: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        },
        Err(err) => RollbackOutcome {
            attempted: true,
            success: false,
            reason: Some(err.to_string()),
        },
    }
}

fn rollback_uncommitted(project_path: &Path, raw_anchor: &str) -> RollbackOutcome {
    let anchor = match UncommittedAnchor::decode(raw_anchor) {
        Ok(anchor) => anchor,
        Err(err) => {
            return RollbackOutcome {
                attempted: true,
                success: false,
                reason: Some(format!("rollback anchor unreadable: {err}")),
            }
        }
    };

    let mut reasons = Vec::new();

    if let Some(sha) = &anchor.stash_sha {
        // `checkout <sha> -- .` overwrites tracked paths with the anchor
        // commit's tree exactly, rather than merging it forward like
        // `stash apply` would — a merge can leave later fixer edits mixed
        // in instead of discarding them, which defeats the point of a
        // rollback.
        match git::run(project_path, &["checkout", sha, "--", "."]) {
            Ok(output) if output.status.success() => {}
            Ok(output) => reasons.push(format!(
                "checkout of anchor tree failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )),
            Err(err) => reasons.push(format!("checkout of anchor tree failed: {err}")),
        }
    }

    match sweep_new_untracked_files(project_path, &anchor.untracked_before) {
        Ok(()) => {}
        Err(message) => reasons.push(message),
    }

    if reasons.is_empty() {
        RollbackOutcome {
            attempted: true,
            success: true,
            reason: None,
        }
    } else {
        let reason = reasons.join("; ");
        tracing::warn!(%reason, "uncommitted-mode rollback did not fully succeed");
        RollbackOutcome {
            attempted: true,
            success: false,
            reason: Some(reason),
        }
    }
}

/// Removes untracked files that exist now but didn't at anchor capture
/// time — i.e. new files the fixer created. Files that were already
/// untracked at capture time and were since modified can't be restored by
/// this anchor; `git stash create` only ever covers tracked content.
fn sweep_new_untracked_files(project_path: &Path, before: &[String]) -> Result<(), String> {
    let after = git::untracked_files(project_path).map_err(|err| err.to_string())?;
    let new_paths: Vec<&String> = after.iter().filter(|path| !before.contains(path)).collect();
    if new_paths.is_empty() {
        return Ok(());
    }

    let mut args = vec!["clean", "-f", "--"];
    args.extend(new_paths.iter().map(|s| s.as_str()));
    let output = git::run(project_path, &args).map_err(|err| err.to_string())?;
    if output.status.success() {
        Ok(())
    } else {
        Err(format!(
            "git clean of new untracked files failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}
