//! Loads the core's read-only `Config`: a TOML file merged over built-in
//! defaults, following `csa-config`'s `ProjectConfig::load` idiom
//! (`csa-config::config`) of returning a fully-populated value rather than
//! failing on a partial or absent file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use rr_core::agent::{AgentId, RoleBinding};
use rr_core::error::RrError;
use rr_core::types::{Config, DefaultReview, RetryConfig};

use crate::paths;

/// Mirrors [`Config`] but with every field optional, so a config file only
/// needs to specify the fields it wants to override.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    reviewer: Option<RoleBinding>,
    fixer: Option<RoleBinding>,
    simplifier: Option<RoleBinding>,
    max_iterations: Option<u32>,
    iteration_timeout_ms: Option<u64>,
    retry: Option<RetryConfig>,
    default_review: Option<DefaultReview>,
}

fn built_in_defaults() -> Config {
    Config {
        reviewer: RoleBinding::new(AgentId::ClaudeCode),
        fixer: RoleBinding::new(AgentId::ClaudeCode),
        simplifier: None,
        max_iterations: 10,
        iteration_timeout_ms: 5 * 60 * 1000,
        retry: None,
        default_review: DefaultReview::Uncommitted,
    }
}

fn merge(raw: RawConfig, defaults: Config) -> Config {
    Config {
        reviewer: raw.reviewer.unwrap_or(defaults.reviewer),
        fixer: raw.fixer.unwrap_or(defaults.fixer),
        simplifier: raw.simplifier.or(defaults.simplifier),
        max_iterations: raw.max_iterations.unwrap_or(defaults.max_iterations),
        iteration_timeout_ms: raw
            .iteration_timeout_ms
            .unwrap_or(defaults.iteration_timeout_ms),
        retry: raw.retry.or(defaults.retry),
        default_review: raw.default_review.unwrap_or(defaults.default_review),
    }
}

fn read_raw(path: &Path) -> Result<RawConfig, RrError> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|err| RrError::ConfigInvalid(format!("{}: {err}", path.display())))
}

/// Load `Config`, preferring `explicit_path` when given, else the resolved
/// XDG config file, else built-in defaults alone. An explicitly requested
/// path that doesn't exist is `ConfigMissing`; an absent auto-resolved path
/// just means "use defaults" since the loader never prompts or persists.
pub fn load_config(explicit_path: Option<&Path>) -> Result<Config, RrError> {
    let raw = match explicit_path {
        Some(path) => {
            if !path.exists() {
                return Err(RrError::ConfigMissing(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            read_raw(path)?
        }
        None => match resolved_config_path() {
            Some(path) if path.exists() => read_raw(&path)?,
            _ => RawConfig::default(),
        },
    };

    let config = merge(raw, built_in_defaults());
    config.validate().map_err(RrError::ConfigInvalid)?;
    Ok(config)
}

fn resolved_config_path() -> Option<PathBuf> {
    paths::config_file_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn no_path_given_and_no_resolved_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_var(paths::CONFIG_PATH_ENV, tmp.path().join("does-not-exist.toml"));
        let config = load_config(None).unwrap();
        std::env::remove_var(paths::CONFIG_PATH_ENV);
        assert_eq!(config, built_in_defaults());
    }

    #[test]
    fn missing_explicit_path_is_config_missing_not_silently_defaulted() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.toml");
        let err = load_config(Some(&missing)).unwrap_err();
        assert!(matches!(err, RrError::ConfigMissing(_)));
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "max_iterations = 25\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.max_iterations, 25);
        assert_eq!(config.reviewer.agent_id, AgentId::ClaudeCode);
        assert_eq!(config.iteration_timeout_ms, built_in_defaults().iteration_timeout_ms);
    }

    #[test]
    fn full_file_overrides_every_field() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
max_iterations = 3
iteration_timeout_ms = 60000

[reviewer]
agent_id = "codex"

[fixer]
agent_id = "codex"

[default_review]
type = "base"
branch = "main"
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.reviewer.agent_id, AgentId::Codex);
        assert_eq!(
            config.default_review,
            DefaultReview::Base {
                branch: "main".to_string()
            }
        );
    }

    #[test]
    fn invalid_config_values_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "max_iterations = 0\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, RrError::ConfigInvalid(_)));
    }
}
