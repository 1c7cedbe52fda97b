//! The Iteration Controller: composition root wiring the Structured Output
//! Parser, Event Log, Lockfile, Agent Invoker, Change-Set Provider, and
//! Prompt Composer into the reviewer→fixer cycle.
//!
//! No module in the source workspace runs this exact loop; the nearest
//! analogue is `csa-session::state`'s explicit state machine
//! (`transition(&mut self, event) -> Result<...>`, one authoritative
//! current-state field mutated only through named transitions). This
//! keeps that shape — one loop, one place that decides the next state,
//! one log entry per transition — generalized from session lifecycle
//! states to reviewer/fixer/rollback iterations.

use std::path::Path;
use std::time::{Duration, Instant};

use rr_changeset::{build_change_set, rollback};
use rr_core::agent::RoleBinding;
use rr_core::error::{Phase, RrError};
use rr_core::ids::SessionId;
use rr_core::types::{
    Config, CurrentAgent, FixSummary, IterationError, LogEntry, ReviewOptions, ReviewSummary,
    Role, SessionStatus,
};
use rr_eventlog::EventWriter;
use rr_invoker::{invoke_with_retry, CancellationToken, InvokeOutcome};
use rr_lock::SessionLock;
use rr_prompt::{compose, PromptContext};

/// What the controller needs from the supervisor beyond `Config`/`ReviewOptions`.
pub struct SupervisorContext {
    pub project_path: String,
    pub branch: Option<String>,
    pub session_id: SessionId,
    pub cancel: CancellationToken,
}

/// The controller's output. The supervisor binary maps `final_status` to a
/// process exit code; the controller itself never touches `std::process`.
#[derive(Debug, Clone)]
pub struct CycleResult {
    pub success: bool,
    pub iterations: u32,
    pub reason: Option<String>,
    pub final_status: SessionStatus,
}

/// Run the reviewer→fixer cycle to completion, failure, or interruption.
/// Always writes exactly one `session_end` log entry before returning.
pub async fn run_cycle(
    config: &Config,
    options: &ReviewOptions,
    ctx: &SupervisorContext,
    lock: &SessionLock,
    log: &mut EventWriter,
) -> CycleResult {
    let mut prev_fix_summary: Option<FixSummary> = None;

    if options.simplifier {
        if run_simplifier_pass(config, options, ctx, lock, log).await {
            return finish(
                log,
                SessionStatus::Interrupted,
                "interrupted during code-simplifier phase".to_string(),
                0,
            );
        }
    }

    for i in 1..=config.max_iterations {
        if ctx.cancel.is_cancelled() {
            return finish(
                log,
                SessionStatus::Interrupted,
                "interrupted before iteration started".to_string(),
                i - 1,
            );
        }

        let _ = lock.touch(&ctx.session_id, Some(CurrentAgent::Reviewer), Some(i));

        let change_set = match build_change_set(Path::new(&ctx.project_path), options) {
            Ok(cs) => cs,
            Err(err) => {
                return finish(
                    log,
                    SessionStatus::Failed,
                    format!("could not build change set: {err}"),
                    i - 1,
                );
            }
        };

        let start = Instant::now();

        let review_prompt_ctx = PromptContext {
            change_set: &change_set,
            iteration: i,
            max_iterations: config.max_iterations,
            force_max_iterations: options.force_max_iterations,
            custom_instructions: options.custom_instructions.as_deref(),
            review_summary: None,
            prev_fix_summary: prev_fix_summary.as_ref(),
        };

        let review_summary = match run_phase::<ReviewSummary>(
            Role::Reviewer,
            Phase::Reviewer,
            &config.reviewer,
            &review_prompt_ctx,
            config,
            ctx,
        )
        .await
        {
            PhaseOutcome::Parsed(rs) => rs,
            PhaseOutcome::Interrupted => {
                append_interrupted_iteration(log, i, start, Phase::Reviewer);
                return finish(
                    log,
                    SessionStatus::Interrupted,
                    "interrupted during reviewer phase".to_string(),
                    i,
                );
            }
            PhaseOutcome::Failed(err) => {
                append_phase_error(log, i, start, None, None, Phase::Reviewer, &err);
                return finish(log, SessionStatus::Failed, err.to_string(), i);
            }
        };

        if review_summary.stop_iteration && !options.force_max_iterations {
            let _ = log.append(&LogEntry::Iteration {
                iteration: i,
                wall_duration_ms: elapsed_ms(start),
                review_summary: Some(review_summary),
                fix_summary: None,
                error: None,
                rollback: None,
            });
            return finish(
                log,
                SessionStatus::Completed,
                "reviewer signalled stop".to_string(),
                i,
            );
        }

        let _ = lock.touch(&ctx.session_id, Some(CurrentAgent::Fixer), Some(i));

        let fix_prompt_ctx = PromptContext {
            change_set: &change_set,
            iteration: i,
            max_iterations: config.max_iterations,
            force_max_iterations: options.force_max_iterations,
            custom_instructions: options.custom_instructions.as_deref(),
            review_summary: Some(&review_summary),
            prev_fix_summary: prev_fix_summary.as_ref(),
        };

        let fix_summary = match run_phase::<FixSummary>(
            Role::Fixer,
            Phase::Fixer,
            &config.fixer,
            &fix_prompt_ctx,
            config,
            ctx,
        )
        .await
        {
            PhaseOutcome::Parsed(fs) => fs,
            PhaseOutcome::Interrupted => {
                append_interrupted_iteration(log, i, start, Phase::Fixer);
                return finish(
                    log,
                    SessionStatus::Interrupted,
                    "interrupted during fixer phase".to_string(),
                    i,
                );
            }
            PhaseOutcome::Failed(err) => {
                let rollback_outcome = rollback(Path::new(&ctx.project_path), &change_set);
                append_phase_error(
                    log,
                    i,
                    start,
                    Some(review_summary),
                    Some(rollback_outcome),
                    Phase::Fixer,
                    &err,
                );
                return finish(log, SessionStatus::Failed, err.to_string(), i);
            }
        };

        let stop_now = fix_summary.stop_iteration && !options.force_max_iterations;
        let _ = log.append(&LogEntry::Iteration {
            iteration: i,
            wall_duration_ms: elapsed_ms(start),
            review_summary: Some(review_summary),
            fix_summary: Some(fix_summary.clone()),
            error: None,
            rollback: None,
        });

        if stop_now {
            return finish(
                log,
                SessionStatus::Completed,
                "fixer signalled stop".to_string(),
                i,
            );
        }

        prev_fix_summary = Some(fix_summary);
    }

    finish(
        log,
        SessionStatus::Completed,
        "reached configured max iterations".to_string(),
        config.max_iterations,
    )
}

/// Run the one-shot simplifier pass (F→D→A with the simplifier role)
/// ahead of the reviewer/fixer loop. Returns `true` iff the pass was
/// interrupted by the cancellation signal, in which case the whole cycle
/// ends; any other failure is logged and swallowed, per the simplifier
/// being a best-effort warmup rather than a load-bearing phase.
async fn run_simplifier_pass(
    config: &Config,
    options: &ReviewOptions,
    ctx: &SupervisorContext,
    lock: &SessionLock,
    log: &mut EventWriter,
) -> bool {
    let Some(binding) = &config.simplifier else {
        tracing::warn!("simplifier requested but no simplifier role is configured; skipping");
        return false;
    };

    let _ = lock.touch(&ctx.session_id, Some(CurrentAgent::CodeSimplifier), Some(0));

    let change_set = match build_change_set(Path::new(&ctx.project_path), options) {
        Ok(cs) => cs,
        Err(err) => {
            tracing::warn!(error = %err, "simplifier pass skipped: could not build change set");
            return false;
        }
    };

    let start = Instant::now();
    let prompt_ctx = PromptContext {
        change_set: &change_set,
        iteration: 0,
        max_iterations: config.max_iterations,
        force_max_iterations: options.force_max_iterations,
        custom_instructions: options.custom_instructions.as_deref(),
        review_summary: None,
        prev_fix_summary: None,
    };

    match run_phase::<FixSummary>(
        Role::Simplifier,
        Phase::CodeSimplifier,
        binding,
        &prompt_ctx,
        config,
        ctx,
    )
    .await
    {
        PhaseOutcome::Parsed(fix_summary) => {
            let _ = log.append(&LogEntry::Iteration {
                iteration: 0,
                wall_duration_ms: elapsed_ms(start),
                review_summary: None,
                fix_summary: Some(fix_summary),
                error: None,
                rollback: None,
            });
            false
        }
        PhaseOutcome::Interrupted => {
            append_interrupted_iteration(log, 0, start, Phase::CodeSimplifier);
            true
        }
        PhaseOutcome::Failed(err) => {
            let rollback_outcome = rollback(Path::new(&ctx.project_path), &change_set);
            append_phase_error(log, 0, start, None, Some(rollback_outcome), Phase::CodeSimplifier, &err);
            false
        }
    }
}

enum PhaseOutcome<T> {
    Parsed(T),
    Interrupted,
    Failed(RrError),
}

/// Compose, invoke, and parse one agent call for `role`. `T` is
/// `ReviewSummary` for the reviewer and `FixSummary` for the fixer and
/// simplifier (both of which edit files and report what they did).
async fn run_phase<T>(
    role: Role,
    phase: Phase,
    binding: &RoleBinding,
    prompt_ctx: &PromptContext<'_>,
    config: &Config,
    ctx: &SupervisorContext,
) -> PhaseOutcome<T>
where
    T: serde::de::DeserializeOwned + rr_parser::SchemaGuard,
{
    let prompt = compose(role, prompt_ctx);
    let invocation = binding.build_invocation(role, &prompt);
    let timeout = Duration::from_millis(config.iteration_timeout_ms);

    let outcome = match invoke_with_retry(&invocation, timeout, &ctx.cancel, phase, config.retry).await {
        Ok(outcome) => outcome,
        Err(err) => return PhaseOutcome::Failed(err),
    };

    if outcome.cancelled {
        return PhaseOutcome::Interrupted;
    }
    if outcome.timed_out {
        return PhaseOutcome::Failed(RrError::AgentTimeout {
            agent: binding.agent_id.as_str().to_string(),
            phase,
            timeout_ms: config.iteration_timeout_ms,
        });
    }

    match rr_parser::parse::<T>(
        outcome.extracted_payload.as_deref(),
        &outcome.stdout,
        invocation.extra_tokens,
    ) {
        Ok(parsed) => PhaseOutcome::Parsed(parsed.value),
        Err(message) => PhaseOutcome::Failed(classify_parse_failure(&outcome, phase, binding, message)),
    }
}

/// A parse failure with a recognizable payload is a schema problem; one
/// with no payload at all and a nonzero exit is really a process failure
/// wearing a parse-failure costume; anything else is a plain missing reply.
fn classify_parse_failure(
    outcome: &InvokeOutcome,
    phase: Phase,
    binding: &RoleBinding,
    message: String,
) -> RrError {
    if outcome.extracted_payload.is_some() {
        return RrError::StructuredOutputInvalid(message);
    }
    if let Some(code) = outcome.exit_code {
        if code != 0 {
            return RrError::AgentNonZeroExit {
                agent: binding.agent_id.as_str().to_string(),
                phase,
                exit_code: code,
            };
        }
    }
    RrError::StructuredOutputMissing
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn append_interrupted_iteration(log: &mut EventWriter, iteration: u32, start: Instant, phase: Phase) {
    let entry = LogEntry::Iteration {
        iteration,
        wall_duration_ms: elapsed_ms(start),
        review_summary: None,
        fix_summary: None,
        error: Some(IterationError {
            phase: phase.as_str().to_string(),
            message: format!("{phase} phase interrupted by cancellation signal"),
            exit_code: Some(130),
        }),
        rollback: None,
    };
    if let Err(e) = log.append(&entry) {
        tracing::warn!(error = %e, "failed to append interrupted iteration entry");
    }
}

fn append_phase_error(
    log: &mut EventWriter,
    iteration: u32,
    start: Instant,
    review_summary: Option<ReviewSummary>,
    rollback_outcome: Option<rr_core::types::RollbackOutcome>,
    phase: Phase,
    err: &RrError,
) {
    let exit_code = match err {
        RrError::AgentNonZeroExit { exit_code, .. } => Some(*exit_code),
        _ => None,
    };
    let entry = LogEntry::Iteration {
        iteration,
        wall_duration_ms: elapsed_ms(start),
        review_summary,
        fix_summary: None,
        error: Some(IterationError {
            phase: phase.as_str().to_string(),
            message: err.to_string(),
            exit_code,
        }),
        rollback: rollback_outcome,
    };
    if let Err(e) = log.append(&entry) {
        tracing::warn!(error = %e, "failed to append iteration error entry");
    }
}

fn finish(log: &mut EventWriter, status: SessionStatus, reason: String, iterations: u32) -> CycleResult {
    let entry = LogEntry::SessionEnd {
        status,
        reason: reason.clone(),
        iterations,
    };
    if let Err(e) = log.append(&entry) {
        tracing::warn!(error = %e, "failed to append session_end entry");
    }
    CycleResult {
        success: matches!(status, SessionStatus::Completed),
        iterations,
        reason: Some(reason),
        final_status: status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::agent::AgentId;
    use rr_core::types::DefaultReview;
    use std::os::unix::fs::PermissionsExt;

    /// Write an executable fake agent at `dir/name` that prints `body`
    /// (already wrapped in the right framing tokens by the caller) to
    /// stdout and exits 0.
    fn fake_agent(dir: &std::path::Path, name: &str, body: &str) {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\ncat <<'EOF'\n{body}\nEOF\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
    }

    /// Prepend `dir` to `PATH` for the test, restoring it on drop. Tests
    /// using this must run `#[serial_test::serial]` since `PATH` is
    /// process-global.
    struct PathGuard(String);
    impl PathGuard {
        fn prepend(dir: &std::path::Path) -> Self {
            let original = std::env::var("PATH").unwrap_or_default();
            std::env::set_var("PATH", format!("{}:{original}", dir.display()));
            Self(original)
        }
    }
    impl Drop for PathGuard {
        fn drop(&mut self) {
            std::env::set_var("PATH", &self.0);
        }
    }

    fn init_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for args in [
            vec!["init", "--quiet"],
            vec!["config", "user.email", "t@example.com"],
            vec!["config", "user.name", "t"],
        ] {
            std::process::Command::new("git")
                .args(&args)
                .current_dir(dir.path())
                .status()
                .unwrap();
        }
        std::fs::write(dir.path().join("a.txt"), "one\n").unwrap();
        std::process::Command::new("git")
            .args(["add", "."])
            .current_dir(dir.path())
            .status()
            .unwrap();
        std::process::Command::new("git")
            .args(["commit", "--quiet", "-m", "init"])
            .current_dir(dir.path())
            .status()
            .unwrap();
        dir
    }

    fn base_config() -> Config {
        Config {
            reviewer: RoleBinding::new(AgentId::ClaudeCode),
            fixer: RoleBinding::new(AgentId::Codex),
            simplifier: None,
            max_iterations: 3,
            iteration_timeout_ms: 5_000,
            retry: None,
            default_review: DefaultReview::Uncommitted,
        }
    }

    async fn run(repo: &std::path::Path, config: &Config) -> CycleResult {
        let state_dir = repo.join("state");
        let session_id = SessionId::new();
        let lock = SessionLock::acquire(&state_dir, repo.to_str().unwrap(), None, "test", session_id)
            .unwrap();
        let mut log = EventWriter::open(&repo.join("log.jsonl")).unwrap();
        let ctx = SupervisorContext {
            project_path: repo.to_str().unwrap().to_string(),
            branch: None,
            session_id: lock.session_id().clone(),
            cancel: CancellationToken::new(),
        };
        let options = ReviewOptions::default();
        run_cycle(config, &options, &ctx, &lock, &mut log).await
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn reviewer_stop_ends_the_cycle_as_completed_after_one_iteration() {
        let repo = init_repo();
        std::fs::write(repo.path().join("a.txt"), "two\n").unwrap();
        let bin_dir = tempfile::tempdir().unwrap();
        fake_agent(
            bin_dir.path(),
            "claude",
            r#"<<<RALPH_REVIEW_START>>>{"decision":"NO_CHANGES_NEEDED","stop_iteration":true,"findings":[]}<<<RALPH_REVIEW_END>>>"#,
        );
        let _path_guard = PathGuard::prepend(bin_dir.path());

        let result = run(repo.path(), &base_config()).await;
        assert!(result.success);
        assert_eq!(result.iterations, 1);
        assert!(matches!(result.final_status, SessionStatus::Completed));
        assert_eq!(result.reason.as_deref(), Some("reviewer signalled stop"));
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn fixer_stop_ends_the_cycle_as_completed() {
        let repo = init_repo();
        std::fs::write(repo.path().join("a.txt"), "two\n").unwrap();
        let bin_dir = tempfile::tempdir().unwrap();
        fake_agent(
            bin_dir.path(),
            "claude",
            r#"<<<RALPH_REVIEW_START>>>{"decision":"APPLY_SELECTIVELY","stop_iteration":false,"findings":[{"id":1,"title":"t","priority":"p2","file":"a.txt","claim":"c","evidence":"e","suggestion":"s"}]}<<<RALPH_REVIEW_END>>>"#,
        );
        fake_agent(
            bin_dir.path(),
            "codex",
            r#"<<<RALPH_FIX_START>>>{"decision":"APPLY_SELECTIVELY","stop_iteration":true,"fixes":[{"id":1,"title":"t","priority":"p2","file":"a.txt","claim":"c","evidence":"e","fix":"done"}],"skipped":[]}<<<RALPH_FIX_END>>>"#,
        );
        let _path_guard = PathGuard::prepend(bin_dir.path());

        let result = run(repo.path(), &base_config()).await;
        assert!(result.success);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.reason.as_deref(), Some("fixer signalled stop"));
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn unparseable_reviewer_output_fails_the_cycle() {
        let repo = init_repo();
        std::fs::write(repo.path().join("a.txt"), "two\n").unwrap();
        let bin_dir = tempfile::tempdir().unwrap();
        fake_agent(bin_dir.path(), "claude", "not json at all, no tokens here");
        let _path_guard = PathGuard::prepend(bin_dir.path());

        let result = run(repo.path(), &base_config()).await;
        assert!(!result.success);
        assert!(matches!(result.final_status, SessionStatus::Failed));
    }

    #[tokio::test]
    async fn cancellation_before_the_loop_starts_is_reported_as_interrupted() {
        let repo = init_repo();
        std::fs::write(repo.path().join("a.txt"), "two\n").unwrap();
        let state_dir = repo.path().join("state");
        let session_id = SessionId::new();
        let lock =
            SessionLock::acquire(&state_dir, repo.path().to_str().unwrap(), None, "test", session_id)
                .unwrap();
        let mut log = EventWriter::open(&repo.path().join("log.jsonl")).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = SupervisorContext {
            project_path: repo.path().to_str().unwrap().to_string(),
            branch: None,
            session_id: lock.session_id().clone(),
            cancel,
        };
        let result = run_cycle(&base_config(), &ReviewOptions::default(), &ctx, &lock, &mut log).await;
        assert!(!result.success);
        assert!(matches!(result.final_status, SessionStatus::Interrupted));
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn precondition_failure_building_the_change_set_fails_the_cycle_without_invoking_agents() {
        // Not a git repository at all: build_change_set should reject this
        // before any agent is spawned.
        let dir = tempfile::tempdir().unwrap();
        let result = run(dir.path(), &base_config()).await;
        assert!(!result.success);
        assert_eq!(result.iterations, 0);
        assert!(matches!(result.final_status, SessionStatus::Failed));
    }
}
