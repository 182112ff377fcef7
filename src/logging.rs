//! Structured logging setup, simplified from the teacher's internal logging crate
//! (`libs/logging/src/lib.rs`, `libs/logging/src/file.rs`) to what this daemon needs: an
//! `EnvFilter`-driven subscriber, either writing to stderr (foreground/bootstrap) or to a
//! non-rotating, line-buffered, append-only file (daemonized).

use std::fs::OpenOptions;
use std::path::Path;

use tracing::subscriber::DefaultGuard;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Holds whatever keeps the logging pipeline alive (currently: the background flush thread for
/// the file writer). Drop it only at process exit.
pub struct LoggingGuard(Option<WorkerGuard>);

/// Initializes the global `tracing` subscriber for the foreground path: human-readable output
/// on stderr, filtered by `RUST_LOG` (default `info`). Foreground mode never forks, so this
/// subscriber is simply permanent for the rest of the process.
pub fn init_foreground(verbosity: u8) -> LoggingGuard {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(std::io::stderr)
        .init();

    LoggingGuard(None)
}

/// A scoped, stderr-only logger for the setup phase of daemonized mode (config parsing,
/// validation), all of which happens before `daemonize::daemonize` forks. Mirrors the teacher's
/// `libs/logging::setup_bootstrap`/`test` split between a scoped, droppable bootstrap
/// subscriber and the one process-wide global subscriber: returning a `DefaultGuard` here
/// (rather than calling `.init()`) means dropping it once setup succeeds doesn't spend the
/// single `set_global_default` call the daemonized child still needs to make for itself, for
/// its own file writer, after forking.
pub fn bootstrap(verbosity: u8) -> DefaultGuard {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(std::io::stderr)
        .set_default()
}

/// Initializes the global `tracing` subscriber for the daemonized path: the same formatting,
/// but writing to `log_path` opened in append mode. The file is never rotated, matching the
/// teacher's connlib file logger (`libs/logging/src/file.rs`): log files leaving the process
/// entirely on their own schedule is this daemon's job, not `tracing-appender`'s.
///
/// Must only be called after `daemonize::daemonize` has forked. `tracing_appender::
/// non_blocking` spawns a background thread to drain its channel; that thread has to exist in
/// the process that actually runs the event loop and logs every per-packet diagnostic (the
/// child), not the parent, which exits immediately after forking and would otherwise be the
/// only process with a thread draining the channel — leaving the child's logging silently
/// dropped once the channel's bounded buffer fills.
pub fn init_daemonized(log_path: &Path, verbosity: u8) -> std::io::Result<LoggingGuard> {
    let file = OpenOptions::new().create(true).append(true).open(log_path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_ansi(false)
        .with_writer(writer)
        .init();

    Ok(LoggingGuard(Some(guard)))
}

fn env_filter(verbosity: u8) -> EnvFilter {
    let default_directive = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemonized_logging_appends_to_the_given_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("repeaterd.log");

        let guard = init_daemonized(&log_path, 0).unwrap();
        tracing::info!("hello from the daemonized logger");
        drop(guard);

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("hello from the daemonized logger"));
    }
}
