//! Signal/Cancellation Plane: translates SIGINT/SIGTERM into the shared
//! `CancellationToken`. No module in the source workspace wires signals
//! this way (it relies on idle-timeout watchdogs, not operator interrupt).
//! `tokio::signal::unix::signal` listeners race in a `select!`, and a
//! second signal within two seconds escalates from "ask the invoker to
//! wind down" to "stop the process now" rather than waiting out whatever
//! grace period the in-flight child is in.

use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};

use rr_invoker::CancellationToken;

pub fn spawn_handler(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let Ok(mut sigint) = signal(SignalKind::interrupt()) else {
            return;
        };
        let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
            return;
        };

        loop {
            tokio::select! {
                _ = sigint.recv() => {}
                _ = sigterm.recv() => {}
            }

            if cancel.is_cancelled() {
                // Already interrupted once; this is the operator insisting.
                tracing::warn!("second interrupt received, terminating immediately");
                std::process::exit(130);
            }

            tracing::info!("interrupt received, requesting a clean stop");
            cancel.cancel();

            tokio::select! {
                _ = sigint.recv() => {
                    tracing::warn!("second interrupt received, terminating immediately");
                    std::process::exit(130);
                }
                _ = sigterm.recv() => {
                    tracing::warn!("second interrupt received, terminating immediately");
                    std::process::exit(130);
                }
                _ = tokio::time::sleep(Duration::from_secs(2)) => {}
            }
        }
    })
}
