//! cli
//!
//! Command-line interface layer for Espalier.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Delegate to command handlers
//! - Does NOT mutate trees directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to
//! command handlers, which drive [`crate::engine`] sessions against a
//! [`crate::repo::FileStore`]. All tree mutations flow through the
//! engine's validated session model.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;

use anyhow::Result;

use crate::ui::output::Verbosity;

/// Settings shared by every command handler.
#[derive(Debug, Clone)]
pub struct Context {
    /// Store directory all repository access goes through.
    pub store: PathBuf,
    /// How much to print.
    pub verbosity: Verbosity,
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug, cli.quiet);

    let ctx = Context {
        store: resolve_store(cli.store.clone()),
        verbosity: Verbosity::from_flags(cli.quiet, cli.debug),
    };

    commands::dispatch(cli.command, &ctx)
}

/// Install the log subscriber.
///
/// The level comes from the flags; `ESPALIER_LOG` overrides both flags
/// with a full filter expression. Logs go to stderr so command output on
/// stdout stays clean.
fn init_tracing(debug: bool, quiet: bool) {
    let default_level = if debug {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("ESPALIER_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// The store named by `--store`, or the default under the user data dir.
fn resolve_store(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("espalier")
    })
}
