//! Agent Invoker: spawns one agent child process per call, enforcing a
//! wall-clock timeout and external cancellation via a two-step
//! interrupt-then-grace-then-kill sequence, with optional jittered-backoff
//! retry for transport-level failures.

mod availability;
mod cancel;
mod invoke;
mod retry;

pub use availability::check_agent_installed;
pub use cancel::CancellationToken;
pub use invoke::{invoke, InvokeOutcome};
pub use retry::invoke_with_retry;
