//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Opens the file store and drives the engine
//! 3. Formats and displays output
//!
//! Handlers do NOT mutate trees directly; every edit goes through an
//! [`crate::engine::EditSession`].

mod completion;
mod edit;
mod init;
mod show;

// Re-export command functions for testing and direct invocation
pub use completion::completion;
pub use edit::{edit, EditArgs};
pub use init::init;
pub use show::show;

use anyhow::Result;

use crate::cli::args::Command;
use crate::cli::Context;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Edit {
            target,
            plan,
            inplace,
            new_config,
            add_config,
            del_config,
            rep_config,
            add_libtype,
            del_libtype,
            rep_libtype,
            include_libtypes,
            exclude_libtypes,
            preview,
            show_tree,
        } => edit(
            ctx,
            EditArgs {
                target,
                plan,
                inplace,
                new_config,
                add_config,
                del_config,
                rep_config,
                add_libtype,
                del_libtype,
                rep_libtype,
                include_libtypes,
                exclude_libtypes,
                preview,
                show_tree,
            },
        ),
        Command::Show { target } => show(ctx, &target),
        Command::Init => init(ctx),
        Command::Completion { shell } => completion(shell),
    }
}
