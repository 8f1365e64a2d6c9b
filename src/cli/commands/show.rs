//! show command - Render a stored configuration tree

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::types::ConfigKey;
use crate::repo::{FileStore, Repository};
use crate::ui::{output, render};

/// Render the tree stored for `target`.
pub fn show(ctx: &Context, target: &str) -> Result<()> {
    let key = ConfigKey::parse(target)?;
    let repo = FileStore::new(&ctx.store);
    let tree = repo
        .load(&key.project, &key.variant, &key.config, None)
        .with_context(|| format!("failed to load {key}"))?;
    output::print(render::report(&tree).trim_end(), ctx.verbosity);
    Ok(())
}
