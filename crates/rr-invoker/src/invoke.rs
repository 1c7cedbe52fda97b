//! Spawning and supervising one agent child process.
//!
//! Grounded on `csa-process::wait_and_capture_with_idle_timeout`
//! (byte-level concurrent stdout/stderr capture via `tokio::select!`,
//! `kill_child_process_group` via negative-pid `SIGKILL`, `setsid` isolation
//! in `pre_exec`) and `spawn_tool_with_options` (piped stdio, a dedicated
//! stdin-writer task with its own timeout). The idle-timeout watchdog there
//! becomes a flat wall-clock deadline here, and the single-step `SIGKILL`
//! becomes the two-step interrupt-then-grace-then-kill the supervisor
//! contract requires.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

use rr_core::agent::Invocation;
use rr_core::error::{Phase, RrError};
use rr_core::tokens::FramingTokens;

use crate::cancel::CancellationToken;

const READ_BUF_SIZE: usize = 4096;
const GRACE_PERIOD: Duration = Duration::from_secs(2);

/// The outcome of one invocation attempt.
#[derive(Debug, Clone)]
pub struct InvokeOutcome {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub extracted_payload: Option<String>,
    pub timed_out: bool,
    pub cancelled: bool,
}

impl InvokeOutcome {
    /// A payload the parser can try framed-extraction or framed-raw on.
    pub fn successful_payload(&self) -> bool {
        !self.timed_out && !self.cancelled && self.extracted_payload.is_some()
    }
}

/// Spawn `invocation`, feed stdin, capture stdout/stderr, and enforce
/// `timeout`/`cancel`. Always returns `Ok` for process-level outcomes
/// (timeout, cancellation, nonzero exit) — `Err` is reserved for failures
/// to even spawn the child.
pub async fn invoke(
    invocation: &Invocation,
    timeout: Duration,
    cancel: &CancellationToken,
    phase: Phase,
) -> Result<InvokeOutcome, RrError> {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args);
    for (key, value) in &invocation.env {
        cmd.env(key, value);
    }
    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.kill_on_drop(true);

    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let mut child = cmd.spawn().map_err(|e| RrError::AgentSpawn {
        agent: invocation.program.clone(),
        message: e.to_string(),
    })?;

    write_stdin(&mut child, invocation.stdin.clone());

    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");

    let (stdout_text, stderr_text, signal) =
        capture_output(&mut child, stdout, stderr, timeout, cancel).await;

    let status = child.wait().await.map_err(RrError::Io)?;
    let exit_code = status.code();

    let extracted_payload = if !matches!(signal, Signal::None) {
        None
    } else {
        scan_for_framed_payload(&stdout_text, invocation.extra_tokens)
    };

    let outcome = InvokeOutcome {
        exit_code,
        stdout: stdout_text,
        stderr: stderr_text,
        extracted_payload,
        timed_out: matches!(signal, Signal::Timeout),
        cancelled: matches!(signal, Signal::Cancelled),
    };

    if matches!(signal, Signal::None) {
        if let Some(code) = outcome.exit_code {
            if code != 0 && outcome.extracted_payload.is_none() {
                tracing::warn!(agent = %invocation.program, %code, "agent exited non-zero with no structured payload");
            }
        }
    }

    Ok(outcome)
}

enum Signal {
    None,
    Timeout,
    Cancelled,
}

fn write_stdin(child: &mut Child, data: String) {
    if let Some(mut stdin) = child.stdin.take() {
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(data.as_bytes()).await {
                tracing::warn!(error = %e, "failed writing agent stdin");
                return;
            }
            let _ = stdin.shutdown().await;
        });
    }
}

async fn capture_output(
    child: &mut Child,
    stdout: tokio::process::ChildStdout,
    stderr: tokio::process::ChildStderr,
    timeout: Duration,
    cancel: &CancellationToken,
) -> (String, String, Signal) {
    let mut stdout_reader = BufReader::new(stdout);
    let mut stderr_reader = BufReader::new(stderr);
    let mut stdout_text = String::new();
    let mut stderr_text = String::new();
    let mut stdout_buf = [0u8; READ_BUF_SIZE];
    let mut stderr_buf = [0u8; READ_BUF_SIZE];
    let mut stdout_done = false;
    let mut stderr_done = false;

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let signal = loop {
        if stdout_done && stderr_done {
            break Signal::None;
        }
        tokio::select! {
            result = stdout_reader.read(&mut stdout_buf), if !stdout_done => {
                match result {
                    Ok(0) | Err(_) => stdout_done = true,
                    Ok(n) => stdout_text.push_str(&String::from_utf8_lossy(&stdout_buf[..n])),
                }
            }
            result = stderr_reader.read(&mut stderr_buf), if !stderr_done => {
                match result {
                    Ok(0) | Err(_) => stderr_done = true,
                    Ok(n) => stderr_text.push_str(&String::from_utf8_lossy(&stderr_buf[..n])),
                }
            }
            () = &mut deadline => {
                break Signal::Timeout;
            }
            () = cancel.cancelled() => {
                break Signal::Cancelled;
            }
        }
    };

    if !matches!(signal, Signal::None) {
        terminate_gracefully(child).await;
        // Drain whatever is left without blocking forever.
        let _ = tokio::time::timeout(Duration::from_millis(200), async {
            let mut rest = String::new();
            let _ = stdout_reader.read_to_string(&mut rest).await;
            stdout_text.push_str(&rest);
        })
        .await;
    }

    (stdout_text, stderr_text, signal)
}

/// Two-step termination: interrupt the whole process group, wait up to
/// `GRACE_PERIOD`, then force-kill it if it hasn't exited.
async fn terminate_gracefully(child: &mut Child) {
    send_signal(child, libc::SIGINT);
    let exited = tokio::time::timeout(GRACE_PERIOD, child.wait()).await;
    if exited.is_err() {
        send_signal(child, libc::SIGKILL);
        let _ = child.wait().await;
    }
}

fn send_signal(child: &mut Child, sig: i32) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: kill(2) is async-signal-safe; negative pid targets the
        // whole process group created via setsid in pre_exec.
        unsafe {
            libc::kill(-(pid as i32), sig);
        }
        return;
    }
    #[cfg(not(unix))]
    let _ = sig;
    let _ = child.start_kill();
}

fn scan_for_framed_payload(stdout: &str, tokens: FramingTokens) -> Option<String> {
    rr_parser::extract_framed(stdout, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::agent::{AgentId, RoleBinding};
    use rr_core::types::Role;

    fn invocation_for(program: &str, args: Vec<&str>) -> Invocation {
        Invocation {
            program: program.to_string(),
            args: args.into_iter().map(str::to_string).collect(),
            stdin: String::new(),
            env: vec![],
            extra_tokens: FramingTokens::for_role(Role::Reviewer),
        }
    }

    #[tokio::test]
    async fn captures_stdout_on_normal_exit() {
        let invocation = invocation_for("sh", vec!["-c", "echo hello"]);
        let outcome = invoke(
            &invocation,
            Duration::from_secs(5),
            &CancellationToken::new(),
            Phase::Reviewer,
        )
        .await
        .unwrap();
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.stdout.contains("hello"));
        assert!(!outcome.timed_out);
        assert!(!outcome.cancelled);
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_without_error() {
        let invocation = invocation_for("sh", vec!["-c", "exit 3"]);
        let outcome = invoke(
            &invocation,
            Duration::from_secs(5),
            &CancellationToken::new(),
            Phase::Fixer,
        )
        .await
        .unwrap();
        assert_eq!(outcome.exit_code, Some(3));
    }

    #[tokio::test]
    async fn timeout_kills_child_and_flags_timed_out() {
        let invocation = invocation_for("sh", vec!["-c", "sleep 30"]);
        let outcome = invoke(
            &invocation,
            Duration::from_millis(100),
            &CancellationToken::new(),
            Phase::Reviewer,
        )
        .await
        .unwrap();
        assert!(outcome.timed_out);
    }

    #[tokio::test]
    async fn external_cancel_stops_the_child() {
        let invocation = invocation_for("sh", vec!["-c", "sleep 30"]);
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_clone.cancel();
        });
        let outcome = invoke(&invocation, Duration::from_secs(10), &cancel, Phase::Fixer)
            .await
            .unwrap();
        assert!(outcome.cancelled);
    }

    #[tokio::test]
    async fn spawn_failure_surfaces_as_agent_spawn_error() {
        let invocation = invocation_for("definitely-not-a-real-binary-xyz", vec![]);
        let result = invoke(
            &invocation,
            Duration::from_secs(1),
            &CancellationToken::new(),
            Phase::Reviewer,
        )
        .await;
        assert!(matches!(result, Err(RrError::AgentSpawn { .. })));
    }

    #[tokio::test]
    async fn extracts_framed_payload_from_stdout() {
        let tokens = FramingTokens::for_role(Role::Reviewer);
        let script = format!(
            "echo '{}{{\"decision\":\"NO_CHANGES_NEEDED\",\"stopIteration\":true,\"findings\":[]}}{}'",
            tokens.start, tokens.end
        );
        let invocation = invocation_for("sh", vec!["-c", &script]);
        let outcome = invoke(
            &invocation,
            Duration::from_secs(5),
            &CancellationToken::new(),
            Phase::Reviewer,
        )
        .await
        .unwrap();
        assert!(outcome.extracted_payload.is_some());
    }

    #[test]
    fn role_binding_smoke_for_invocation_shape() {
        let binding = RoleBinding::new(AgentId::ClaudeCode);
        let inv = binding.build_invocation(Role::Fixer, "prompt text");
        assert_eq!(inv.program, "claude");
    }
}
