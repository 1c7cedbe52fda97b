//! Process-wide cancellation token, wired into the Invoker (kills children),
//! the Iteration Controller (breaks the loop at the next safe point), and
//! the Lockfile writer (ensures `release(interrupted)` is reached).
//!
//! The source workspace has no direct analogue — its cancellation is scoped to
//! idle-timeout watchdogs inside `csa-process`, not a cross-cutting signal
//! plane — so this is built from `tokio::sync::Notify` plus an `AtomicBool`,
//! the same pair `tokio-util`'s `CancellationToken` wraps internally, kept
//! local to avoid adding a dependency the rest of the stack doesn't carry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Clone, Default)]
pub struct CancellationToken(Arc<Inner>);

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent; waiters are woken every call.
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called. Safe to race in a `select!`
    /// arm even if cancellation already happened before this was polled.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        loop {
            let notified = self.0.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
            if self.is_cancelled() {
                return;
            }
        }
    }
}
