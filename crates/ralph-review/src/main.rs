//! Supervisor glue: parse CLI flags, load config, resolve paths, acquire
//! the session lock, drive one reviewer/fixer cycle, and map the result
//! to a process exit code.
//!
//! Wiring order follows `cli-sub-agent`'s `main.rs` (init tracing, parse
//! `Cli`, dispatch) generalized to the single-purpose shape this binary
//! needs: there is no subcommand tree, only one review cycle per process.

mod cli;
mod logging;
mod signal;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use cli::Cli;
use rr_core::types::{CurrentAgent, LockState, ReviewOptions, SessionStatus};
use rr_core::SessionId;
use rr_eventlog::EventWriter;
use rr_invoker::{check_agent_installed, CancellationToken};
use rr_lock::{SessionLock, HEARTBEAT_INTERVAL};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let project_path = resolve_project_path(cli.cd.as_deref())?;
    let project_path_str = project_path.to_string_lossy().into_owned();

    let config = rr_config::load_config(cli.config.as_deref())
        .with_context(|| "failed to load configuration")?;

    let options = build_review_options(&cli, &config);
    if let Err(message) = options.validate() {
        bail!("invalid review options: {message}");
    }

    for binding in [Some(&config.reviewer), Some(&config.fixer), config.simplifier.as_ref()]
        .into_iter()
        .flatten()
    {
        if let Err(err) = check_agent_installed(binding.agent_id) {
            eprintln!("{err}");
            std::process::exit(err.exit_code());
        }
    }

    let branch = rr_changeset::current_branch(&project_path);

    let logs_root = rr_config::paths::logs_root();
    let state_root = rr_config::paths::state_root();

    let _log_guard = logging::init(&logs_root, cli.verbose)
        .with_context(|| "failed to initialize logging")?;

    let session_id = match &cli.session {
        Some(raw) => raw
            .parse::<SessionId>()
            .with_context(|| format!("invalid --session id '{raw}'"))?,
        None => SessionId::new(),
    };

    tracing::info!(
        session_id = %session_id,
        project_path = %project_path_str,
        branch = branch.as_deref().unwrap_or("<none>"),
        "starting review session"
    );

    let log_path = rr_eventlog::open_log_path(&logs_root, &project_path_str, branch.as_deref(), chrono::Utc::now())
        .with_context(|| "failed to compute event log path")?;
    let mut log = EventWriter::open(&log_path).with_context(|| "failed to open event log")?;

    log.append(&rr_core::types::LogEntry::System {
        project_path: project_path_str.clone(),
        branch: branch.clone(),
        reviewer: config.reviewer.clone(),
        fixer: config.fixer.clone(),
        simplifier: config.simplifier.clone(),
        max_iterations: config.max_iterations,
        session_id,
        timestamp: chrono::Utc::now(),
    })
    .with_context(|| "failed to write session-start log entry")?;

    let session_name = format!("ralph-review-{session_id}");
    let lock = match SessionLock::acquire(
        &state_root,
        &project_path_str,
        branch.as_deref(),
        &session_name,
        session_id,
    ) {
        Ok(lock) => lock,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(err.exit_code());
        }
    };
    lock.promote(&session_id, rr_core::types::SessionMode::Foreground, None)
        .with_context(|| "failed to promote lock to running")?;

    let cancel = CancellationToken::new();
    let _signal_task = signal::spawn_handler(cancel.clone());
    let _heartbeat_task = spawn_heartbeat(lock.clone(), session_id, cancel.clone());

    let ctx = rr_controller::SupervisorContext {
        project_path: project_path_str,
        branch,
        session_id,
        cancel,
    };

    let result = rr_controller::run_cycle(&config, &options, &ctx, &lock, &mut log).await;

    tracing::info!(
        success = result.success,
        iterations = result.iterations,
        status = ?result.final_status,
        reason = result.reason.as_deref().unwrap_or(""),
        "review session ended"
    );

    let terminal_state = match result.final_status {
        SessionStatus::Completed => LockState::Completed,
        SessionStatus::Failed | SessionStatus::Unknown => LockState::Failed,
        SessionStatus::Interrupted => LockState::Interrupted,
    };
    let reason = result.reason.clone().unwrap_or_default();
    if let Err(err) = lock.release(&session_id, terminal_state, &reason) {
        tracing::warn!(error = %err, "failed to release session lock");
    }

    if let Err(err) = rr_eventlog::rebuild_summary(log.path()) {
        tracing::warn!(error = %err, "failed to rebuild session summary");
    }

    let exit_code = match result.final_status {
        SessionStatus::Completed => 0,
        SessionStatus::Interrupted => 130,
        SessionStatus::Failed | SessionStatus::Unknown => 1,
    };
    std::process::exit(exit_code);
}

fn resolve_project_path(cd: Option<&std::path::Path>) -> Result<PathBuf> {
    let raw = match cd {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir().with_context(|| "failed to read current directory")?,
    };
    raw.canonicalize()
        .with_context(|| format!("project path '{}' does not exist", raw.display()))
}

fn build_review_options(cli: &Cli, config: &rr_core::types::Config) -> ReviewOptions {
    let mut options = ReviewOptions {
        base_branch: cli.base.clone(),
        commit_sha: cli.commit.clone(),
        custom_instructions: cli.custom.clone(),
        simplifier: cli.simplifier,
        force_max_iterations: cli.force_max_iterations,
    };
    options = rr_config::env::apply_review_option_overrides(options);

    let nothing_selected = options.base_branch.is_none()
        && options.commit_sha.is_none()
        && options.custom_instructions.is_none();
    if nothing_selected {
        if let rr_core::types::DefaultReview::Base { branch } = &config.default_review {
            options.base_branch = Some(branch.clone());
        }
    }
    options
}

/// Background ticker touching the lockfile's heartbeat at a fixed cadence,
/// independent of iteration state, per the concurrency model's single
/// background-ticker task. Does not touch `currentAgent`/`iteration` —
/// those are refreshed by the controller's own per-phase `touch` calls.
fn spawn_heartbeat(
    lock: SessionLock,
    session_id: SessionId,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {}
                _ = cancel.cancelled() => break,
            }
            if cancel.is_cancelled() {
                break;
            }
            let _ = lock.touch(&session_id, None::<CurrentAgent>, None);
        }
    })
}
