//! The environment contract the core reads and never writes: absolute
//! project path, current branch, optional session id, and optional
//! review-mode overrides. Everything else is passed in-memory by the
//! supervisor binary.

use rr_core::types::ReviewOptions;

pub const PROJECT_PATH_ENV: &str = "RALPH_REVIEW_PROJECT_PATH";
pub const BRANCH_ENV: &str = "RALPH_REVIEW_BRANCH";
pub const SESSION_ID_ENV: &str = "RALPH_REVIEW_SESSION_ID";
pub const BASE_BRANCH_ENV: &str = "RALPH_REVIEW_BASE_BRANCH";
pub const COMMIT_SHA_ENV: &str = "RALPH_REVIEW_COMMIT_SHA";
pub const CUSTOM_INSTRUCTIONS_ENV: &str = "RALPH_REVIEW_CUSTOM_INSTRUCTIONS";
pub const FORCE_MAX_ITERATIONS_ENV: &str = "RALPH_REVIEW_FORCE_MAX_ITERATIONS";

/// The run-identifying part of the environment contract: where the review
/// runs and what session it resumes, as opposed to which mode it runs in.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub project_path: Option<String>,
    pub branch: Option<String>,
    pub session_id: Option<String>,
}

fn read(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

pub fn run_context_from_env() -> RunContext {
    RunContext {
        project_path: read(PROJECT_PATH_ENV),
        branch: read(BRANCH_ENV),
        session_id: read(SESSION_ID_ENV),
    }
}

/// Review-mode overrides layered on top of whatever the caller already
/// populated in `base` (typically `ReviewOptions::default()` or CLI flags);
/// an environment variable only wins if the corresponding field is unset.
pub fn apply_review_option_overrides(mut base: ReviewOptions) -> ReviewOptions {
    if base.base_branch.is_none() {
        base.base_branch = read(BASE_BRANCH_ENV);
    }
    if base.commit_sha.is_none() {
        base.commit_sha = read(COMMIT_SHA_ENV);
    }
    if base.custom_instructions.is_none() {
        base.custom_instructions = read(CUSTOM_INSTRUCTIONS_ENV);
    }
    if !base.force_max_iterations {
        base.force_max_iterations = read(FORCE_MAX_ITERATIONS_ENV)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
    }
    base
}
