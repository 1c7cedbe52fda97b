//! Rollback anchor encodings.
//!
//! `base` and `commit` mode anchors are a bare commit sha: restoring them is
//! a plain `git reset --hard <sha>`, since nothing but the working tree and
//! index needs to move back. `uncommitted` mode needs more: a dangling
//! commit captured via `git stash create` plus the set of paths that were
//! untracked at capture time, so [`crate::rollback`] can tell which
//! untracked files the fixer introduced and clean up only those.
//!
//! `git stash create` has no `--include-untracked` flag — that option only
//! exists on `git stash push`/`git stash save`, and those mutate the stash
//! list and reset the working tree, which is exactly what capturing an
//! anchor must not do. So untracked files are handled out of band: recorded
//! by path at capture time, and swept with a scoped `git clean` at restore
//! time rather than folded into the stash object itself.

use serde::{Deserialize, Serialize};

use rr_core::error::RrError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncommittedAnchor {
    /// Sha of the dangling commit from `git stash create`, or `None` when
    /// there was nothing tracked to stash (an uncommitted-mode diff made up
    /// entirely of new untracked files).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stash_sha: Option<String>,
    /// Paths reported by `git ls-files --others --exclude-standard` at
    /// capture time, so restore can tell which untracked files are new.
    pub untracked_before: Vec<String>,
}

impl UncommittedAnchor {
    pub fn encode(&self) -> Result<String, RrError> {
        serde_json::to_string(self).map_err(RrError::Json)
    }

    pub fn decode(raw: &str) -> Result<Self, RrError> {
        serde_json::from_str(raw).map_err(RrError::Json)
    }
}
