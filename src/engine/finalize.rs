//! engine::finalize
//!
//! Re-identification of modified composites at the end of a run.
//!
//! In-place mode accepts only a tree whose immutable composites all kept
//! their children; any entry in the modified set is fatal. New-name mode
//! renames every modified composite still reachable in the tree, plus the
//! root, to the chosen name, after checking that none of those identities
//! already exist in the store. Renames mutate nodes in place, so shared
//! subtrees stay shared.

use std::collections::HashSet;
use std::rc::Rc;

use tracing::info;

use crate::core::node::NodeRef;
use crate::core::types::{ConfigKey, VariantKey};
use crate::core::walk;
use crate::ops::EditMode;
use crate::repo::Repository;

use super::{EditError, ModifiedSet};

/// Apply the mode's re-identification policy to the edited tree.
///
/// Returns the former identities of every renamed composite, in rename
/// order, with the root last. A collision performs no renames at all.
pub fn finalize(
    repo: &dyn Repository,
    root: &NodeRef,
    mode: &EditMode,
    modified: &ModifiedSet,
) -> Result<Vec<ConfigKey>, EditError> {
    let new_name = match mode {
        EditMode::InPlace => {
            if modified.is_empty() {
                return Ok(Vec::new());
            }
            return Err(EditError::ImmutableInPlace);
        }
        EditMode::NewConfig(name) => name,
    };

    // Pruning can detach a marked composite; only reachable ones rename.
    // The root itself renames last whether or not it was marked.
    let mut targets: Vec<NodeRef> = modified
        .iter()
        .filter(|node| !Rc::ptr_eq(node, root) && walk::contains(root, node))
        .map(Rc::clone)
        .collect();
    targets.push(Rc::clone(root));

    let mut locations: HashSet<VariantKey> = HashSet::new();
    let mut collisions = Vec::new();
    for node in &targets {
        let location = node.borrow().location();
        if !locations.insert(location.clone()) {
            continue;
        }
        if repo.config_exists(&location.project, &location.variant, new_name)? {
            collisions.push(ConfigKey::new(
                location.project,
                location.variant,
                new_name.clone(),
            ));
        }
    }
    if !collisions.is_empty() {
        collisions.sort();
        return Err(EditError::NamingCollision(collisions));
    }

    let mut renamed = Vec::with_capacity(targets.len());
    for node in &targets {
        let mut node = node.borrow_mut();
        if let Some(cfg) = node.as_config_mut() {
            let former = cfg.key();
            info!(
                "Renaming {} to {}/{}@{}",
                former, cfg.project, cfg.variant, new_name
            );
            cfg.config = new_name.clone();
            renamed.push(former);
        }
    }
    Ok(renamed)
}
