//! CLI front-end: `repeaterd <config> <log-file> [--foreground] [-v]...`.
//!
//! Shape follows the teacher's single-binary crates (`gateway/src/main.rs`, `cli/src/main.rs`):
//! a `clap::Parser` struct, logging initialized before anything else, `fn main` translating
//! every failure into a diagnostic plus a non-zero exit code.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use repeaterd::bootstrap::{self, Mode, Outcome};

/// Configurable UDP packet repeater.
#[derive(Debug, Parser)]
#[command(name = "repeaterd", about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file.
    config: PathBuf,

    /// Path to the log file. Ignored in `--foreground` mode, where diagnostics go to stderr.
    log_file: PathBuf,

    /// Run attached to the terminal instead of forking and redirecting to the log file.
    #[arg(long)]
    foreground: bool,

    /// Increase log verbosity (`-v` = debug, `-vv` = trace). Overridden by `RUST_LOG` if set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Daemonized mode can't install its permanent file-based subscriber yet: that requires
    // `daemonize::daemonize` to have forked first, so the non-blocking writer's flush thread is
    // started in the child that actually keeps running. Until then, a scoped bootstrap logger
    // (dropped by `bootstrap::run` right before it forks) covers config parsing and validation.
    let (_logging_guard, bootstrap_log) = if cli.foreground {
        (Some(repeaterd::logging::init_foreground(cli.verbose)), None)
    } else {
        (None, Some(repeaterd::logging::bootstrap(cli.verbose)))
    };

    let source = match std::fs::read_to_string(&cli.config) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!("Failed to read configuration file {:?}: {e}", cli.config);
            return ExitCode::FAILURE;
        }
    };

    let registry = match repeaterd::config::parse(&source) {
        Ok(registry) => registry,
        Err(errors) => {
            for error in &errors {
                tracing::error!("{error}");
            }
            return ExitCode::FAILURE;
        }
    };

    let mode = if cli.foreground {
        Mode::Foreground
    } else {
        Mode::Daemonize {
            log_file: &cli.log_file,
            verbosity: cli.verbose,
        }
    };

    match bootstrap::run(registry, mode, bootstrap_log) {
        Ok(Outcome::ForkedParent) => ExitCode::SUCCESS,
        Ok(Outcome::Served(Ok(never))) => match never {},
        Ok(Outcome::Served(Err(poll_error))) => {
            tracing::error!("{poll_error}");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
