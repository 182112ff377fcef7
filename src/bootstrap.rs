//! Drives: populate the Registry → run the Validator → open sockets → (optionally daemonize) →
//! enter the Event Loop. Mirrors the teacher's `relay/src/main.rs` top-level wiring shape, minus
//! everything STUN/TURN-specific.

use std::path::Path;

use crate::error::{PollError, SocketError, ValidationError};
use crate::registry::Registry;
use crate::sockets::SocketManager;
use crate::{daemonize, event_loop, validator};

/// Every way `run` can fail to ever reach the event loop.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("configuration failed validation:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("failed to daemonize: {0}")]
    Daemonize(#[source] nix::Error),
    #[error(transparent)]
    Poll(#[from] PollError),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether to detach from the controlling terminal before serving.
pub enum Mode<'a> {
    /// Fork, `setsid`, redirect `stdout`/`stderr` to `log_file`, then serve in the child.
    Daemonize { log_file: &'a Path, verbosity: u8 },
    /// Serve in the foreground, attached to the current terminal. Used by tests and
    /// interactive debugging.
    Foreground,
}

/// Outcome of `run` for the calling process. The binary's `main` maps this directly to an exit
/// code/action: a forking parent just exits 0, everyone else serves forever or has already
/// failed loudly.
pub enum Outcome {
    /// This process was the parent of a successful fork; the child will serve. Exit 0.
    ForkedParent,
    /// This process serves forever (either the daemonized child, or foreground mode). `run`
    /// only returns here on a fatal, unrecoverable error.
    Served(Result<std::convert::Infallible, PollError>),
}

/// Validates `registry`, opens every socket it references, and then either hands off to the
/// daemonized child or serves in the foreground, per `mode`.
///
/// `bootstrap_log` is the scoped, stderr-only logger (`logging::bootstrap`) installed by `main`
/// for everything up to this point; it is dropped here, right before daemonizing, so that it
/// never shadows the child's own permanent file-based subscriber, which `daemonize::daemonize`
/// installs itself after forking. Foreground mode has no such guard to drop (`main` installs its
/// permanent subscriber directly), so it is always `None` there.
pub fn run(
    registry: Registry,
    mode: Mode<'_>,
    bootstrap_log: Option<tracing::subscriber::DefaultGuard>,
) -> Result<Outcome, BootstrapError> {
    let violations = validator::validate(&registry);
    if !violations.is_empty() {
        for violation in &violations {
            tracing::error!("{violation}");
        }
        return Err(BootstrapError::Validation(violations));
    }

    let mut sockets = SocketManager::new()?;
    for listener in registry.listeners() {
        sockets.open_listener(listener.id, listener.address, listener.port)?;
    }
    for transmitter in registry.transmitters() {
        sockets.open_transmitter(transmitter.id, transmitter.address, transmitter.port)?;
    }

    drop(bootstrap_log);

    let _file_guard;
    match mode {
        Mode::Daemonize { log_file, verbosity } => {
            match daemonize::daemonize(log_file, verbosity).map_err(BootstrapError::Daemonize)? {
                daemonize::DaemonizeOutcome::Parent => return Ok(Outcome::ForkedParent),
                daemonize::DaemonizeOutcome::Child(guard) => _file_guard = Some(guard),
            }
        }
        Mode::Foreground => _file_guard = None,
    }

    tracing::info!(
        listeners = registry.listeners().count(),
        transmitters = registry.transmitters().count(),
        targets = registry.targets().count(),
        maps = registry.maps().len(),
        "entering event loop"
    );

    Ok(Outcome::Served(event_loop::run(&registry, &mut sockets)))
}
