//! Exponential backoff with jitter for transport-level invocation failures.
//!
//! The source workspace's retry/backoff code (`csa-executor/transport.rs`)
//! rolls its own jitter inline with a hand-built LCG rather than pulling in
//! `rand`; this port reaches for `rand::thread_rng()` instead, matching how
//! the broader example corpus handles jittered backoff elsewhere.

use std::time::Duration;

use rand::Rng;

use rr_core::agent::Invocation;
use rr_core::error::{Phase, RrError};
use rr_core::types::RetryConfig;

use crate::cancel::CancellationToken;
use crate::invoke::{invoke, InvokeOutcome};

/// Run `invocation` with retry, honoring `retry` when transport-level
/// failures occur: a timeout, a spawn failure, or a nonzero exit that
/// carried no structured payload. A successful structured payload is never
/// retried, even alongside a nonzero exit code. Cancellation is never
/// retried either — it propagates to the caller on the first attempt.
pub async fn invoke_with_retry(
    invocation: &Invocation,
    timeout: Duration,
    cancel: &CancellationToken,
    phase: Phase,
    retry: Option<RetryConfig>,
) -> Result<InvokeOutcome, RrError> {
    let config = retry.unwrap_or(RetryConfig {
        max_retries: 0,
        base_delay_ms: 0,
        max_delay_ms: 0,
    });

    let mut attempt = 0u32;
    loop {
        let result = invoke(invocation, timeout, cancel, phase).await;

        let should_retry = match &result {
            Ok(outcome) if outcome.cancelled => false,
            Ok(outcome) if outcome.timed_out => true,
            Ok(outcome) => outcome.exit_code != Some(0) && outcome.extracted_payload.is_none(),
            Err(RrError::AgentSpawn { .. }) => true,
            Err(_) => false,
        };

        if !should_retry || attempt >= config.max_retries {
            return result;
        }

        let delay = backoff_delay(&config, attempt);
        tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying agent invocation");
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => return result,
        }
        attempt += 1;
    }
}

fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let jitter: f64 = rand::thread_rng().gen_range(0.5..1.5);
    let exponential = config.base_delay_ms as f64 * 2f64.powi(attempt as i32) * jitter;
    let bounded = exponential.min(config.max_delay_ms as f64).max(0.0);
    Duration::from_millis(bounded as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::tokens::FramingTokens;
    use rr_core::types::Role;

    fn invocation(script: &str) -> Invocation {
        Invocation {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            stdin: String::new(),
            env: vec![],
            extra_tokens: FramingTokens::for_role(Role::Reviewer),
        }
    }

    #[tokio::test]
    async fn retries_transport_failure_until_success() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("attempts");
        let script = format!(
            "c=$(cat {m} 2>/dev/null || echo 0); c=$((c+1)); echo $c > {m}; [ $c -ge 3 ] && exit 0 || exit 1",
            m = marker.display()
        );
        let invocation = invocation(&script);
        let retry = RetryConfig {
            max_retries: 5,
            base_delay_ms: 1,
            max_delay_ms: 2,
        };
        let outcome = invoke_with_retry(
            &invocation,
            Duration::from_secs(5),
            &CancellationToken::new(),
            Phase::Reviewer,
            Some(retry),
        )
        .await
        .unwrap();
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[tokio::test]
    async fn exhausts_retries_and_returns_last_failure() {
        let invocation = invocation("exit 1");
        let retry = RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        };
        let outcome = invoke_with_retry(
            &invocation,
            Duration::from_secs(5),
            &CancellationToken::new(),
            Phase::Fixer,
            Some(retry),
        )
        .await
        .unwrap();
        assert_eq!(outcome.exit_code, Some(1));
    }

    #[tokio::test]
    async fn no_retry_config_means_single_attempt() {
        let invocation = invocation("exit 1");
        let outcome = invoke_with_retry(
            &invocation,
            Duration::from_secs(5),
            &CancellationToken::new(),
            Phase::Fixer,
            None,
        )
        .await
        .unwrap();
        assert_eq!(outcome.exit_code, Some(1));
    }

    #[test]
    fn backoff_delay_is_bounded_by_max_delay() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay_ms: 1000,
            max_delay_ms: 5000,
        };
        for attempt in 0..10 {
            let delay = backoff_delay(&config, attempt);
            assert!(delay.as_millis() as u64 <= 5000);
        }
    }
}
