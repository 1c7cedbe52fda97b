//! Append-only JSONL event log plus rebuildable summary sidecar.
//!
//! Grounded on `csa-session`'s `event_writer.rs`: append-then-flush to
//! a file opened in append mode, with resume-on-reopen tolerance for a
//! torn trailing write. The high-frequency batching (`FLUSH_SIZE_BYTES`,
//! a timed flush interval) that module needs for streaming tool output
//! does not apply here — a session emits at most a few dozen entries —
//! so this writer flushes synchronously on every `append` instead, trading
//! a little throughput for a simpler crash-safety argument.

mod paths;
mod reader;
mod summary;
mod writer;

pub use paths::open_log_path;
pub use reader::{read_all, read_incremental, IncrementalOutcome, ResumeState};
pub use summary::rebuild_summary;
pub use writer::EventWriter;
