//! Role-specific framing tokens that wrap a structured JSON reply.

use crate::types::Role;

/// The `START_TOKEN`/`END_TOKEN` pair a given role's reply must be wrapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramingTokens {
    pub start: &'static str,
    pub end: &'static str,
}

impl FramingTokens {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Reviewer => Self {
                start: "<<<RALPH_REVIEW_START>>>",
                end: "<<<RALPH_REVIEW_END>>>",
            },
            Role::Fixer => Self {
                start: "<<<RALPH_FIX_START>>>",
                end: "<<<RALPH_FIX_END>>>",
            },
            Role::Simplifier => Self {
                start: "<<<RALPH_SIMPLIFY_START>>>",
                end: "<<<RALPH_SIMPLIFY_END>>>",
            },
        }
    }
}
