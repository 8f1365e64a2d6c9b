//! init command - Create an empty configuration store

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::repo::FileStore;
use crate::ui::output;

/// Create an empty store document if none exists.
pub fn init(ctx: &Context) -> Result<()> {
    let store = FileStore::new(&ctx.store);
    let created = store
        .init()
        .with_context(|| format!("failed to initialize store at {}", ctx.store.display()))?;

    if created {
        output::print(
            format!("Initialized empty store at {}", ctx.store.display()),
            ctx.verbosity,
        );
    } else {
        output::print(
            format!("Store already exists at {}", ctx.store.display()),
            ctx.verbosity,
        );
    }
    Ok(())
}
