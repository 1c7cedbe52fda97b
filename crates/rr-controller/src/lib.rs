//! The Iteration Controller and Signal/Cancellation Plane: the loop that
//! drives a review session from start to its one `session_end` entry.

mod controller;

pub use controller::{run_cycle, CycleResult, SupervisorContext};
pub use rr_invoker::CancellationToken;
