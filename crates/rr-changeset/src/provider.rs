//! Builds a [`ChangeSet`] for each of the four review modes.
//!
//! Grounded on `csa-session::git`'s functions
//! (`commit_session`, `history`): synchronous `git` shell-outs, `--`
//! guards before every pathspec, and exit-code-driven `PreconditionFailed`
//! errors rather than a git library binding.

use std::path::Path;

use rr_core::error::RrError;
use rr_core::types::{ChangeSet, ChangeSetMode, ReviewOptions};

use crate::anchor::UncommittedAnchor;
use crate::git;

pub fn build_change_set(
    project_path: &Path,
    options: &ReviewOptions,
) -> Result<ChangeSet, RrError> {
    if !git::is_working_tree(project_path) {
        return Err(RrError::PreconditionFailed(format!(
            "{} is not inside a git working tree",
            project_path.display()
        )));
    }

    match options.mode() {
        ChangeSetMode::Uncommitted => build_uncommitted(project_path),
        ChangeSetMode::Base => {
            let branch = options
                .base_branch
                .as_deref()
                .ok_or_else(|| RrError::ConfigInvalid("baseBranch is required in base mode".into()))?;
            build_base(project_path, branch)
        }
        ChangeSetMode::Commit => {
            let sha = options
                .commit_sha
                .as_deref()
                .ok_or_else(|| RrError::ConfigInvalid("commitSha is required in commit mode".into()))?;
            build_commit(project_path, sha)
        }
        ChangeSetMode::Custom => Ok(ChangeSet {
            mode: ChangeSetMode::Custom,
            diff_text: options.custom_instructions.clone().unwrap_or_default(),
            rollback_anchor: None,
        }),
    }
}

fn diff_against_head_or_empty_tree(project_path: &Path, args: &[&str]) -> Result<String, RrError> {
    let base = if git::has_head(project_path) {
        "HEAD".to_string()
    } else {
        git::EMPTY_TREE_SHA.to_string()
    };
    let mut full_args = vec!["diff", base.as_str()];
    full_args.extend_from_slice(args);
    let output = git::run(project_path, &full_args)?;
    git::require_success(&output, "git diff failed")?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn untracked_diff_text(project_path: &Path, paths: &[String]) -> Result<String, RrError> {
    let mut text = String::new();
    for path in paths {
        let output = git::run(project_path, &["diff", "--no-index", "--", "/dev/null", path])?;
        // exit code 1 is the normal "files differ" outcome for --no-index.
        if output.status.code().unwrap_or(1) > 1 {
            return Err(RrError::PreconditionFailed(format!(
                "git diff --no-index failed for untracked file {path}: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        text.push_str(&String::from_utf8_lossy(&output.stdout));
    }
    Ok(text)
}

fn build_uncommitted(project_path: &Path) -> Result<ChangeSet, RrError> {
    if !git::has_uncommitted_changes(project_path)? {
        return Err(RrError::PreconditionFailed(
            "no uncommitted changes in the working tree".to_string(),
        ));
    }

    let untracked_before = git::untracked_files(project_path)?;
    let tracked_diff = diff_against_head_or_empty_tree(project_path, &[])?;
    let untracked_diff = untracked_diff_text(project_path, &untracked_before)?;

    let stash_output = git::run(project_path, &["stash", "create"])?;
    git::require_success(&stash_output, "git stash create failed")?;
    let stash_sha = git::stdout_trimmed(&stash_output);
    let anchor = UncommittedAnchor {
        stash_sha: if stash_sha.is_empty() { None } else { Some(stash_sha) },
        untracked_before,
    };

    Ok(ChangeSet {
        mode: ChangeSetMode::Uncommitted,
        diff_text: format!("{tracked_diff}{untracked_diff}"),
        rollback_anchor: Some(anchor.encode()?),
    })
}

fn build_base(project_path: &Path, branch: &str) -> Result<ChangeSet, RrError> {
    let merge_base_output = git::run(project_path, &["merge-base", "HEAD", branch])?;
    git::require_success(
        &merge_base_output,
        &format!("no merge base between HEAD and '{branch}'"),
    )?;
    let merge_base = git::stdout_trimmed(&merge_base_output);

    let diff_output = git::run(project_path, &["diff", &merge_base, "HEAD"])?;
    git::require_success(&diff_output, "git diff against merge-base failed")?;

    Ok(ChangeSet {
        mode: ChangeSetMode::Base,
        diff_text: String::from_utf8_lossy(&diff_output.stdout).into_owned(),
        rollback_anchor: Some(git::head_sha(project_path)?),
    })
}

fn build_commit(project_path: &Path, sha: &str) -> Result<ChangeSet, RrError> {
    let show_output = git::run(project_path, &["show", "--format=", sha])?;
    git::require_success(&show_output, &format!("commit '{sha}' not found"))?;

    Ok(ChangeSet {
        mode: ChangeSetMode::Commit,
        diff_text: String::from_utf8_lossy(&show_output.stdout).into_owned(),
        rollback_anchor: Some(git::head_sha(project_path)?),
    })
}
