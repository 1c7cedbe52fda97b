//! The review-cycle data model: `Config`, `ReviewOptions`, structured agent
//! replies, the change set, and the append-only log entry shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::RoleBinding;
use crate::ids::SessionId;

/// The function an agent plays in one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Reviewer,
    Fixer,
    Simplifier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reviewer => "reviewer",
            Role::Fixer => "fixer",
            Role::Simplifier => "code-simplifier",
        }
    }
}

/// The agent currently holding the floor, as recorded on the lockfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CurrentAgent {
    Reviewer,
    Fixer,
    CodeSimplifier,
}

impl From<Role> for CurrentAgent {
    fn from(role: Role) -> Self {
        match role {
            Role::Reviewer => CurrentAgent::Reviewer,
            Role::Fixer => CurrentAgent::Fixer,
            Role::Simplifier => CurrentAgent::CodeSimplifier,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Foreground,
    Background,
}

/// Retry policy for transport-level Agent Invoker failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// The review mode a run falls back to when `ReviewOptions` specifies none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DefaultReview {
    Uncommitted,
    Base { branch: String },
}

/// Read-only, injected run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub reviewer: RoleBinding,
    pub fixer: RoleBinding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simplifier: Option<RoleBinding>,
    pub max_iterations: u32,
    pub iteration_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
    pub default_review: DefaultReview,
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_iterations == 0 {
            return Err("maxIterations must be positive".to_string());
        }
        if self.iteration_timeout_ms == 0 {
            return Err("iterationTimeout must be positive".to_string());
        }
        self.reviewer.validate()?;
        self.fixer.validate()?;
        if let Some(simplifier) = &self.simplifier {
            simplifier.validate()?;
        }
        if let DefaultReview::Base { branch } = &self.default_review {
            if branch.is_empty() {
                return Err("defaultReview.branch must be non-empty".to_string());
            }
        }
        if let Some(retry) = &self.retry {
            if retry.base_delay_ms == 0 || retry.max_delay_ms == 0 {
                return Err("retry delays must be positive".to_string());
            }
        }
        Ok(())
    }
}

/// Per-run options selecting the review mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    #[serde(default)]
    pub simplifier: bool,
    #[serde(default)]
    pub force_max_iterations: bool,
}

impl ReviewOptions {
    /// Validate the mutual-exclusivity rule: at most one of
    /// `baseBranch`/`commitSha`/`customInstructions` may be set.
    pub fn validate(&self) -> Result<(), String> {
        let set = [
            self.base_branch.is_some(),
            self.commit_sha.is_some(),
            self.custom_instructions.is_some(),
        ]
        .iter()
        .filter(|x| **x)
        .count();
        if set > 1 {
            return Err(
                "at most one of baseBranch, commitSha, customInstructions may be set".to_string(),
            );
        }
        Ok(())
    }

    pub fn mode(&self) -> ChangeSetMode {
        if self.custom_instructions.is_some() {
            ChangeSetMode::Custom
        } else if self.commit_sha.is_some() {
            ChangeSetMode::Commit
        } else if self.base_branch.is_some() {
            ChangeSetMode::Base
        } else {
            ChangeSetMode::Uncommitted
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    NoChangesNeeded,
    ApplySelectively,
    ApplyMost,
    ApplyAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub id: u32,
    pub title: String,
    pub priority: Priority,
    pub file: String,
    pub claim: String,
    pub evidence: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub decision: Decision,
    pub stop_iteration: bool,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl ReviewSummary {
    /// `findings` ids must be unique and start counting from 1; enforced as
    /// a schema guard by the parser rather than an invariant on this type.
    pub fn has_well_formed_ids(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.findings.iter().all(|f| f.id >= 1 && seen.insert(f.id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixEntry {
    pub id: u32,
    pub title: String,
    pub priority: Priority,
    pub file: String,
    pub claim: String,
    pub evidence: String,
    pub fix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub id: u32,
    pub title: String,
    pub priority: Priority,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixSummary {
    pub decision: Decision,
    pub stop_iteration: bool,
    #[serde(default)]
    pub fixes: Vec<FixEntry>,
    #[serde(default)]
    pub skipped: Vec<SkippedEntry>,
}

impl FixSummary {
    /// Every id in `fixes ∪ skipped` must appear in the preceding review's
    /// findings.
    pub fn references_only_known_ids(&self, review: &ReviewSummary) -> bool {
        let known: std::collections::HashSet<u32> = review.findings.iter().map(|f| f.id).collect();
        self.fixes.iter().all(|f| known.contains(&f.id))
            && self.skipped.iter().all(|s| known.contains(&s.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeSetMode {
    Uncommitted,
    Base,
    Commit,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub mode: ChangeSetMode,
    pub diff_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_anchor: Option<String>,
}

/// Lockfile states, per the `absent → pending → running → terminal → absent`
/// state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    Pending,
    Running,
    Completed,
    Failed,
    Interrupted,
}

impl LockState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LockState::Completed | LockState::Failed | LockState::Interrupted
        )
    }
}

/// The derived status of a session, independent of the lockfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Completed,
    Failed,
    Interrupted,
    Unknown,
}

/// A phase error recorded on an `iteration` log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationError {
    pub phase: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackOutcome {
    pub attempted: bool,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One append-only entry in the session event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    System {
        project_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
        reviewer: RoleBinding,
        fixer: RoleBinding,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        simplifier: Option<RoleBinding>,
        max_iterations: u32,
        session_id: SessionId,
        timestamp: DateTime<Utc>,
    },
    Iteration {
        iteration: u32,
        wall_duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        review_summary: Option<ReviewSummary>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fix_summary: Option<FixSummary>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<IterationError>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rollback: Option<RollbackOutcome>,
    },
    SessionEnd {
        status: SessionStatus,
        reason: String,
        iterations: u32,
    },
}

/// Counts of findings by priority, used by the sidecar summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCounts {
    pub p0: u32,
    pub p1: u32,
    pub p2: u32,
    pub p3: u32,
}

/// Rebuildable sidecar derived from the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub schema_version: u32,
    pub log_path: String,
    pub status: SessionStatus,
    pub iterations: u32,
    pub total_fixes: u32,
    pub total_skipped: u32,
    pub priority_counts: PriorityCounts,
    pub rollback_count: u32,
    pub rollback_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_iteration: Option<bool>,
    pub has_iteration: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub project_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
}

pub const SESSION_SUMMARY_SCHEMA_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentId;

    fn binding() -> RoleBinding {
        RoleBinding::new(AgentId::ClaudeCode)
    }

    #[test]
    fn review_options_rejects_multiple_modes() {
        let opts = ReviewOptions {
            base_branch: Some("main".into()),
            commit_sha: Some("deadbeef".into()),
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn review_options_defaults_to_uncommitted() {
        let opts = ReviewOptions::default();
        assert!(opts.validate().is_ok());
        assert_eq!(opts.mode(), ChangeSetMode::Uncommitted);
    }

    #[test]
    fn config_requires_positive_iterations() {
        let config = Config {
            reviewer: binding(),
            fixer: binding(),
            simplifier: None,
            max_iterations: 0,
            iteration_timeout_ms: 1000,
            retry: None,
            default_review: DefaultReview::Uncommitted,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn fix_summary_rejects_unknown_ids() {
        let review = ReviewSummary {
            decision: Decision::ApplySelectively,
            stop_iteration: false,
            findings: vec![Finding {
                id: 1,
                title: "t".into(),
                priority: Priority::P1,
                file: "f.rs".into(),
                claim: "c".into(),
                evidence: "e".into(),
                suggestion: "s".into(),
            }],
        };
        let fix = FixSummary {
            decision: Decision::ApplySelectively,
            stop_iteration: false,
            fixes: vec![FixEntry {
                id: 2,
                title: "t".into(),
                priority: Priority::P1,
                file: "f.rs".into(),
                claim: "c".into(),
                evidence: "e".into(),
                fix: "f".into(),
            }],
            skipped: vec![],
        };
        assert!(!fix.references_only_known_ids(&review));
    }

    #[test]
    fn review_summary_detects_duplicate_ids() {
        let mk = |id| Finding {
            id,
            title: "t".into(),
            priority: Priority::P2,
            file: "f".into(),
            claim: "c".into(),
            evidence: "e".into(),
            suggestion: "s".into(),
        };
        let summary = ReviewSummary {
            decision: Decision::ApplyAll,
            stop_iteration: false,
            findings: vec![mk(1), mk(1)],
        };
        assert!(!summary.has_well_formed_ids());
    }

    #[test]
    fn log_entry_round_trips_as_tagged_json() {
        let entry = LogEntry::SessionEnd {
            status: SessionStatus::Completed,
            reason: "reviewer signalled stop".to_string(),
            iterations: 1,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"type\":\"session_end\""));
        let parsed: LogEntry = serde_json::from_str(&json).unwrap();
        match parsed {
            LogEntry::SessionEnd { iterations, .. } => assert_eq!(iterations, 1),
            _ => panic!("wrong variant"),
        }
    }
}
