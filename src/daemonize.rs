//! Forks, detaches from the controlling terminal, and redirects `stdout`/`stderr` to the
//! append-mode log file (SPEC_FULL.md §4.10).
//!
//! Not grounded in a specific teacher file: daemonization is named by the distilled spec as an
//! external collaborator, and the retrieved TURN-relay pack runs under systemd in the
//! foreground rather than forking. The `fork`/`setsid`/`dup2` sequence below is the standard
//! idiomatic use of the `nix::unistd` module the teacher already depends on elsewhere for
//! process/user operations (`gateway/src/main.rs`, `boringtun/src/device/drop_privileges.rs`).

use std::fs::OpenOptions;
use std::os::fd::AsRawFd;
use std::path::Path;

use nix::unistd::{self, ForkResult};

use crate::logging::LoggingGuard;

/// What the caller should do once `daemonize` returns.
pub enum DaemonizeOutcome {
    /// This process was the parent of a successful fork; the caller should exit immediately
    /// with status 0 (validation and socket binding have already succeeded by the time this is
    /// called, so "forked successfully" reliably means "the child will start serving").
    Parent,
    /// This process is the detached child, now the daemon. Holds the file logger's
    /// worker-thread guard; the caller must keep it alive for the remainder of the process.
    Child(LoggingGuard),
}

/// Forks the calling process, detaches the child from its controlling terminal, redirects
/// `stdout`/`stderr` to `log_path` (opened in append mode, unbuffered at the fd level so every
/// `write` lands immediately — the "line buffering" the spec asks for is then just each log
/// line being one `write`), and installs the child's permanent file-based `tracing` subscriber.
///
/// The subscriber (and its non-blocking writer's background flush thread) is installed here, in
/// the child, *after* `fork` returns, never before it in the parent: a thread started before
/// `fork` would not exist in the child (fork only duplicates the calling thread), so installing
/// it early would leave the child's logging channel undrained and logging silently lost once
/// its bounded buffer filled.
pub fn daemonize(log_path: &Path, verbosity: u8) -> nix::Result<DaemonizeOutcome> {
    // SAFETY: called before any additional threads are spawned — the bootstrap-phase logger
    // installed by `main` (`logging::bootstrap`) writes synchronously to stderr and starts no
    // thread, and the file logger's flush thread is only started below, after this fork — so
    // the single-threaded-after-fork precondition `nix::unistd::fork` documents is upheld.
    match unsafe { unistd::fork()? } {
        ForkResult::Parent { .. } => Ok(DaemonizeOutcome::Parent),
        ForkResult::Child => {
            unistd::setsid()?;
            redirect_stdio(log_path)?;
            let guard = crate::logging::init_daemonized(log_path, verbosity).map_err(io_to_nix)?;
            Ok(DaemonizeOutcome::Child(guard))
        }
    }
}

fn redirect_stdio(log_path: &Path) -> nix::Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(io_to_nix)?;

    let fd = log_file.as_raw_fd();

    // SAFETY: `fd` is a valid, open file descriptor for the lifetime of this call; `dup2`
    // leaves it open afterwards (the duplicate stdout/stderr fds reference the same file), so
    // `log_file`'s own `Drop` closing `fd` afterwards is harmless.
    unsafe {
        if libc::dup2(fd, libc::STDOUT_FILENO) == -1 {
            return Err(nix::Error::last());
        }
        if libc::dup2(fd, libc::STDERR_FILENO) == -1 {
            return Err(nix::Error::last());
        }
    }

    Ok(())
}

fn io_to_nix(e: std::io::Error) -> nix::Error {
    e.raw_os_error()
        .map(nix::Error::from_i32)
        .unwrap_or(nix::Error::EIO)
}
