//! Closed enumeration of supported CLI agent identities and the role
//! binding that configures one for a given run.
//!
//! Modeled directly on `csa-core`'s `ToolName`/`Executor` pair: a
//! data enum (not a trait object) dispatched over a fixed, known-at-compile
//! -time set of backends.

use serde::{Deserialize, Serialize};

use crate::tokens::FramingTokens;
use crate::types::Role;

/// One of a closed set of supported CLI agent identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentId {
    ClaudeCode,
    Codex,
    OpenCode,
    GeminiCli,
}

impl AgentId {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::ClaudeCode => "claude-code",
            AgentId::Codex => "codex",
            AgentId::OpenCode => "opencode",
            AgentId::GeminiCli => "gemini-cli",
        }
    }

    /// The executable name looked up on `PATH`.
    pub fn executable_name(&self) -> &'static str {
        match self {
            AgentId::ClaudeCode => "claude",
            AgentId::Codex => "codex",
            AgentId::OpenCode => "opencode",
            AgentId::GeminiCli => "gemini",
        }
    }

    /// Whether this agent denotes the multi-provider backend, in which case
    /// `RoleBinding::provider_id` is required.
    pub fn is_multi_provider(&self) -> bool {
        matches!(self, AgentId::OpenCode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningLevel {
    Low,
    Medium,
    High,
    XHigh,
    Max,
}

impl ReasoningLevel {
    fn as_arg(&self) -> &'static str {
        match self {
            ReasoningLevel::Low => "low",
            ReasoningLevel::Medium => "medium",
            ReasoningLevel::High => "high",
            ReasoningLevel::XHigh => "xhigh",
            ReasoningLevel::Max => "max",
        }
    }
}

/// A role binding: which agent plays a role, and how it's configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub agent_id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_level: Option<ReasoningLevel>,
}

impl RoleBinding {
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            model_id: None,
            provider_id: None,
            reasoning_level: None,
        }
    }

    /// Validate the `provider_id` requirement for multi-provider backends.
    pub fn validate(&self) -> Result<(), String> {
        if self.agent_id.is_multi_provider() && self.provider_id.is_none() {
            return Err(format!(
                "agent '{}' requires providerId",
                self.agent_id.as_str()
            ));
        }
        Ok(())
    }

    /// Build the argv/stdin/env for invoking this binding in the given role.
    ///
    /// The Invoker depends only on this method, never on the concrete
    /// `AgentId` variant — callers should not match on `agent_id` directly
    /// outside this module.
    pub fn build_invocation(&self, role: Role, prompt: &str) -> Invocation {
        let mut args = Vec::new();
        if let Some(model) = &self.model_id {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if let Some(provider) = &self.provider_id {
            args.push("--provider".to_string());
            args.push(provider.clone());
        }
        if let Some(level) = &self.reasoning_level {
            args.push("--reasoning-effort".to_string());
            args.push(level.as_arg().to_string());
        }
        args.push("--print".to_string());

        Invocation {
            program: self.agent_id.executable_name().to_string(),
            args,
            stdin: prompt.to_string(),
            env: vec![("RALPH_REVIEW_ROLE".to_string(), role.as_str().to_string())],
            extra_tokens: FramingTokens::for_role(role),
        }
    }
}

/// Everything the Agent Invoker needs to spawn one call.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: String,
    pub env: Vec<(String, String)>,
    pub extra_tokens: FramingTokens,
}
