//! Error taxonomy for Ralph Review.
//!
//! Shaped after `csa-core`'s `AppError` (`csa-core/src/error.rs`): a
//! single flat `thiserror` enum rather than nested per-crate error types,
//! with a variant per failure class the loop can hit.

use thiserror::Error;

/// Which phase of the iteration an error occurred in, used both on
/// `IterationError.phase` and for the `tracing` fields emitted around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reviewer,
    Fixer,
    CodeSimplifier,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Reviewer => "reviewer",
            Phase::Fixer => "fixer",
            Phase::CodeSimplifier => "code-simplifier",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RrError {
    #[error("configuration missing: {0}")]
    ConfigMissing(String),

    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("agent '{0}' is not installed")]
    AgentUnavailable(String),

    #[error("review already in progress for this project/branch")]
    LockContention,

    #[error("agent '{agent}' timed out after {timeout_ms}ms during {phase}")]
    AgentTimeout {
        agent: String,
        phase: Phase,
        timeout_ms: u64,
    },

    #[error("failed to spawn agent '{agent}': {message}")]
    AgentSpawn { agent: String, message: String },

    #[error("agent '{agent}' exited with code {exit_code} during {phase}")]
    AgentNonZeroExit {
        agent: String,
        phase: Phase,
        exit_code: i32,
    },

    #[error("no structured output candidate matched the required schema")]
    StructuredOutputMissing,

    #[error("structured output invalid: {0}")]
    StructuredOutputInvalid(String),

    #[error("rollback failed: {0}")]
    RollbackFailed(String),

    #[error("session interrupted")]
    Interrupted,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RrError {
    /// The process exit code this error maps to; used only by the
    /// supervisor binary (library crates never call `std::process::exit`).
    pub fn exit_code(&self) -> i32 {
        match self {
            RrError::Interrupted => 130,
            _ => 1,
        }
    }

    /// Whether the Iteration Controller may retry this error per the
    /// transport-level retry policy (timeout / spawn failure / non-zero
    /// exit without a structured payload).
    pub fn is_retryable_transport_error(&self) -> bool {
        matches!(
            self,
            RrError::AgentTimeout { .. } | RrError::AgentSpawn { .. } | RrError::AgentNonZeroExit { .. }
        )
    }

    /// Whether this error is fatal at startup (before the loop begins),
    /// as opposed to a per-iteration error.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            RrError::ConfigMissing(_)
                | RrError::ConfigInvalid(_)
                | RrError::PreconditionFailed(_)
                | RrError::AgentUnavailable(_)
                | RrError::LockContention
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupted_maps_to_130() {
        assert_eq!(RrError::Interrupted.exit_code(), 130);
    }

    #[test]
    fn other_errors_map_to_1() {
        assert_eq!(RrError::LockContention.exit_code(), 1);
        assert_eq!(
            RrError::StructuredOutputMissing.exit_code(),
            1
        );
    }

    #[test]
    fn transport_errors_are_retryable() {
        let err = RrError::AgentTimeout {
            agent: "codex".into(),
            phase: Phase::Reviewer,
            timeout_ms: 500,
        };
        assert!(err.is_retryable_transport_error());
        assert!(!RrError::StructuredOutputMissing.is_retryable_transport_error());
    }

    #[test]
    fn startup_errors_are_fatal() {
        assert!(RrError::LockContention.is_fatal_at_startup());
        assert!(!RrError::StructuredOutputMissing.is_fatal_at_startup());
    }

    #[test]
    fn display_messages_are_human_readable() {
        let err = RrError::AgentNonZeroExit {
            agent: "codex".into(),
            phase: Phase::Fixer,
            exit_code: 2,
        };
        assert_eq!(
            err.to_string(),
            "agent 'codex' exited with code 2 during fixer"
        );
    }
}
