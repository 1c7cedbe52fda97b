//! Session-scoped logging setup, grounded on
//! `csa-executor::logging::create_session_log_writer`: a non-blocking
//! rolling file appender under the session's log root, paired here with a
//! stderr layer so a crashed process still leaves both a terminal trace
//! and a file one.

use std::path::Path;

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Returns the file appender's
/// worker guard, which must be kept alive for the process's lifetime —
/// dropping it stops the background flush thread.
///
/// `verbosity` is the `-v` repeat count; it only raises the default level
/// below `info` and never overrides an explicit `RUST_LOG`.
pub fn init(logs_root: &Path, verbosity: u8) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(logs_root)?;

    let file_name = format!("ralph-review-{}.log", chrono::Utc::now().format("%Y%m%dT%H%M%S"));
    let file_appender = tracing_appender::rolling::never(logs_root, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr.and(non_blocking))
        .with_ansi(false)
        .try_init()
        .ok();

    Ok(guard)
}
