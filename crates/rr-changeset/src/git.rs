//! Thin wrappers around shelling out to the system `git` binary.
//!
//! Mirrors `csa-session::git`'s module: plain
//! `std::process::Command`, `current_dir` scoping, and exit-code-driven
//! error messages rather than a `git2`/libgit2 binding — the corpus never
//! reaches for a git library crate, only the system binary.

use std::path::Path;
use std::process::{Command, Output};

use rr_core::error::RrError;

/// The canonical empty-tree object id, used as a diff base when `HEAD`
/// doesn't exist yet (a brand new repository with no commits).
pub const EMPTY_TREE_SHA: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

pub fn run(dir: &Path, args: &[&str]) -> Result<Output, RrError> {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(RrError::Io)
}

pub fn stdout_trimmed(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn require_success(output: &Output, context: &str) -> Result<(), RrError> {
    if output.status.success() {
        Ok(())
    } else {
        Err(RrError::PreconditionFailed(format!(
            "{context}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

pub fn is_working_tree(dir: &Path) -> bool {
    run(dir, &["rev-parse", "--is-inside-work-tree"])
        .map(|o| o.status.success() && stdout_trimmed(&o) == "true")
        .unwrap_or(false)
}

pub fn current_branch(dir: &Path) -> Option<String> {
    let output = run(dir, &["rev-parse", "--abbrev-ref", "HEAD"]).ok()?;
    if !output.status.success() {
        return None;
    }
    let name = stdout_trimmed(&output);
    if name.is_empty() || name == "HEAD" {
        None
    } else {
        Some(name)
    }
}

pub fn has_head(dir: &Path) -> bool {
    run(dir, &["rev-parse", "--verify", "HEAD"])
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub fn head_sha(dir: &Path) -> Result<String, RrError> {
    let output = run(dir, &["rev-parse", "HEAD"])?;
    require_success(&output, "git rev-parse HEAD failed")?;
    Ok(stdout_trimmed(&output))
}

pub fn has_uncommitted_changes(dir: &Path) -> Result<bool, RrError> {
    let output = run(dir, &["status", "--porcelain"])?;
    require_success(&output, "git status failed")?;
    Ok(!stdout_trimmed(&output).is_empty())
}

pub fn untracked_files(dir: &Path) -> Result<Vec<String>, RrError> {
    let output = run(dir, &["ls-files", "--others", "--exclude-standard"])?;
    require_success(&output, "git ls-files failed")?;
    Ok(stdout_trimmed(&output)
        .lines()
        .map(str::to_string)
        .filter(|l| !l.is_empty())
        .collect())
}
