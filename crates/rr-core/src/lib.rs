//! Shared data model for Ralph Review: the agent/role types, config shape,
//! structured-reply schemas, and the error taxonomy every other crate in
//! the workspace builds on.

pub mod agent;
pub mod error;
pub mod ids;
pub mod sanitize;
pub mod tokens;
pub mod types;

pub use agent::{AgentId, Invocation, ReasoningLevel, RoleBinding};
pub use error::{Phase, RrError};
pub use ids::SessionId;
pub use types::{
    ChangeSet, ChangeSetMode, Config, CurrentAgent, Decision, DefaultReview, Finding, FixEntry,
    FixSummary, LockState, LogEntry, Priority, RetryConfig, ReviewOptions, ReviewSummary, Role,
    SessionMode, SessionStatus, SessionSummary, SkippedEntry,
};
