//! engine::mutate
//!
//! Tree surgery for the six operation families and the libtype filters.
//!
//! # Architecture
//!
//! Every function here works on the session's live tree. Matches are found
//! fresh for each operation entry with [`walk::find_occurrences`], never
//! cached across entries, so an entry always sees the shape left behind by
//! the entries before it.
//!
//! # Invariants
//!
//! - A zero-match entry is fatal; a surgery call that finds its target
//!   already unlinked is recorded as a recoverable failure
//! - Marking happens only for parents whose children actually changed,
//!   and only when that parent is immutable
//! - The re-identification closure is recomputed from the current tree
//!   shape at every mutation; nothing holds reverse pointers

use std::collections::HashSet;
use std::rc::Rc;

use tracing::{error, info, warn};

use crate::core::node::{Node, NodeRef};
use crate::core::types::{FullName, LibraryKey, Libtype, LibtypeKey, VariantKey};
use crate::core::walk::{self, Occurrence};
use crate::ops::{AddConfig, AddLibtype, DelConfig, DelLibtype, RepConfig, RepLibtype};
use crate::repo::Repository;

use super::EditError;

/// The composites that must be re-identified before the tree can be
/// published again.
///
/// A true set keyed by pointer identity, preserving first-insertion order
/// so rename and report output stay deterministic.
#[derive(Debug, Default)]
pub struct ModifiedSet {
    nodes: Vec<NodeRef>,
    seen: HashSet<usize>,
}

impl ModifiedSet {
    /// Insert a node. Returns false when it was already present.
    pub fn insert(&mut self, node: &NodeRef) -> bool {
        if self.seen.insert(Rc::as_ptr(node) as usize) {
            self.nodes.push(Rc::clone(node));
            true
        } else {
            false
        }
    }

    pub fn contains(&self, node: &NodeRef) -> bool {
        self.seen.contains(&(Rc::as_ptr(node) as usize))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeRef> {
        self.nodes.iter()
    }
}

/// Record a child-list change under `parent`.
///
/// Mutable parents never enter the modified set and propagate nothing.
/// For an immutable parent the whole re-identification closure is
/// recorded: the parent itself plus every immutable node on any current
/// root path leading to it.
pub fn mark_children_changed(root: &NodeRef, parent: &NodeRef, modified: &mut ModifiedSet) {
    if !parent.borrow().is_immutable() {
        return;
    }
    for node in walk::immutable_on_paths(root, parent) {
        modified.insert(&node);
    }
}

/// Every composite occurrence at a `project/variant` location.
pub fn find_config_occurrences(root: &NodeRef, location: &VariantKey) -> Vec<Occurrence> {
    walk::find_occurrences(root, |node| {
        node.is_config() && node.location() == *location
    })
}

/// Every library leaf occurrence at a `project/variant:libtype` location.
pub fn find_library_occurrences(root: &NodeRef, location: &LibtypeKey) -> Vec<Occurrence> {
    walk::find_occurrences(root, |node| {
        matches!(node, Node::Library(lib) if lib.location() == *location)
    })
}

fn not_found(name: impl Into<String>, root: &NodeRef) -> EditError {
    EditError::NotFound {
        name: name.into(),
        tree: root.borrow().full_name(),
    }
}

fn parent_names(parents: &[NodeRef]) -> String {
    parents
        .iter()
        .map(|p| p.borrow().full_name())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unlink `child` from `parent`'s children. Returns false when the link
/// was already gone.
fn unlink(parent: &NodeRef, child: &NodeRef) -> bool {
    parent
        .borrow_mut()
        .as_config_mut()
        .map(|cfg| cfg.remove_child(child))
        .unwrap_or(false)
}

/// Remove every config at each target location, optionally scoped to an
/// allow-list of parent locations.
///
/// Unscoped entries unlink every occurrence from every parent. Scoped
/// entries only touch parents whose location is in the allow-list; a
/// scoped entry whose allow-list matches no actual parent is a no-op.
pub fn delete_configs(
    root: &NodeRef,
    ops: &[DelConfig],
    modified: &mut ModifiedSet,
    failures: &mut Vec<String>,
) -> Result<(), EditError> {
    info!("Processing configurations to remove");

    for op in ops {
        let occurrences = find_config_occurrences(root, &op.target);
        if occurrences.is_empty() {
            return Err(not_found(op.target.to_string(), root));
        }

        for occ in &occurrences {
            let child_name = occ.node.borrow().full_name();
            for parent in &occ.parents {
                if !op.parents.is_empty() && !op.parents.contains(&parent.borrow().location()) {
                    continue;
                }
                info!("Removing {} from {}", child_name, parent.borrow().full_name());
                if unlink(parent, &occ.node) {
                    mark_children_changed(root, parent, modified);
                } else {
                    let failure = format!(
                        "problem removing {} from {}",
                        child_name,
                        parent.borrow().full_name()
                    );
                    error!("{failure}");
                    failures.push(failure);
                }
            }
        }
    }
    Ok(())
}

/// Link a stored config under every composite at its target location.
///
/// The source tree is loaded once and the same node instance is linked
/// under every target, so later edits to it are seen from every parent.
/// Occurrences bearing the source's own full name are skipped, so a
/// config never links under itself.
pub fn add_configs(
    repo: &dyn Repository,
    root: &NodeRef,
    ops: &[AddConfig],
    modified: &mut ModifiedSet,
) -> Result<(), EditError> {
    info!("Processing new configurations");

    for op in ops {
        let source = repo.load(
            &op.source.project,
            &op.source.variant,
            &op.source.config,
            None,
        )?;
        let source_name = source.borrow().full_name();

        let occurrences = find_config_occurrences(root, &op.target);
        if occurrences.is_empty() {
            return Err(not_found(op.target.to_string(), root));
        }

        for occ in &occurrences {
            if occ.node.borrow().full_name() == source_name {
                continue;
            }
            info!(
                "Adding {} to {}",
                op.source,
                occ.node.borrow().full_name()
            );
            let added = occ
                .node
                .borrow_mut()
                .as_config_mut()
                .map(|cfg| cfg.add_child(Rc::clone(&source)))
                .unwrap_or(false);
            if added {
                mark_children_changed(root, &occ.node, modified);
            }
        }
    }
    Ok(())
}

/// Swap every config at each target location for its named replacement.
///
/// Entries execute in increasing order of their shallowest occurrence, and
/// occurrences are re-found per entry, so a deeper target is still matched
/// inside a subtree that an earlier replacement grafted in. Occurrences
/// already bearing the replacement's full name are skipped.
pub fn replace_configs(
    repo: &dyn Repository,
    root: &NodeRef,
    ops: &[RepConfig],
    modified: &mut ModifiedSet,
    failures: &mut Vec<String>,
) -> Result<(), EditError> {
    info!("Processing configuration replacements");

    let mut entries = Vec::with_capacity(ops.len());
    for op in ops {
        let replacement = repo.load(&op.target.project, &op.target.variant, &op.new_name, None)?;

        let occurrences = find_config_occurrences(root, &op.target);
        if occurrences.is_empty() {
            return Err(not_found(op.target.to_string(), root));
        }
        let depth = occurrences
            .iter()
            .filter_map(|occ| walk::max_depth_of(root, &occ.node))
            .min()
            .unwrap_or(0);
        entries.push((depth, op, replacement));
    }
    entries.sort_by(|a, b| {
        (a.0, &a.1.target, &a.1.new_name).cmp(&(b.0, &b.1.target, &b.1.new_name))
    });

    for (_, op, replacement) in entries {
        let new_name = replacement.borrow().full_name();
        for occ in find_config_occurrences(root, &op.target) {
            if occ.node.borrow().full_name() == new_name {
                continue;
            }
            info!(
                "Replacing {} with {} from {}",
                occ.node.borrow().full_name(),
                new_name,
                parent_names(&occ.parents)
            );
            for parent in &occ.parents {
                let swapped = parent
                    .borrow_mut()
                    .as_config_mut()
                    .map(|cfg| cfg.replace_child(&occ.node, &replacement))
                    .unwrap_or(false);
                if swapped {
                    mark_children_changed(root, parent, modified);
                } else {
                    let failure = format!(
                        "nothing replaced for {} under {}",
                        occ.node.borrow().full_name(),
                        parent.borrow().full_name()
                    );
                    warn!("{failure}");
                    failures.push(failure);
                }
            }
        }
    }
    Ok(())
}

/// Remove every library leaf at each target `project/variant:libtype`
/// location from all of its parents.
pub fn delete_libtypes(
    root: &NodeRef,
    ops: &[DelLibtype],
    modified: &mut ModifiedSet,
    failures: &mut Vec<String>,
) -> Result<(), EditError> {
    info!("Processing libtype configurations to remove");

    for op in ops {
        let occurrences = find_library_occurrences(root, &op.target);
        if occurrences.is_empty() {
            return Err(not_found(op.target.to_string(), root));
        }

        for occ in &occurrences {
            let child_name = occ.node.borrow().full_name();
            info!("Removing {} from {}", child_name, parent_names(&occ.parents));
            for parent in &occ.parents {
                if unlink(parent, &occ.node) {
                    mark_children_changed(root, parent, modified);
                } else {
                    let failure = format!(
                        "problem removing {} from {}",
                        child_name,
                        parent.borrow().full_name()
                    );
                    error!("{failure}");
                    failures.push(failure);
                }
            }
        }
    }
    Ok(())
}

/// Link a library leaf under every composite at the leaf's own location,
/// optionally restricted to composites with a given config name.
pub fn add_libtypes(
    repo: &dyn Repository,
    root: &NodeRef,
    ops: &[AddLibtype],
    modified: &mut ModifiedSet,
) -> Result<(), EditError> {
    info!("Processing new libtype configurations");

    for op in ops {
        let leaf = repo.resolve_full_name(&FullName::Library(op.source.clone()))?;
        let location = VariantKey::new(op.source.project.clone(), op.source.variant.clone());

        let occurrences: Vec<Occurrence> = find_config_occurrences(root, &location)
            .into_iter()
            .filter(|occ| match &op.scope {
                None => true,
                Some(scope) => {
                    matches!(&*occ.node.borrow(), Node::Config(cfg) if cfg.config == *scope)
                }
            })
            .collect();
        if occurrences.is_empty() {
            let name = match &op.scope {
                None => location.to_string(),
                Some(scope) => format!("{location}@{scope}"),
            };
            return Err(not_found(name, root));
        }

        for occ in &occurrences {
            info!(
                "Adding {} to {}",
                op.source,
                occ.node.borrow().full_name()
            );
            let added = occ
                .node
                .borrow_mut()
                .as_config_mut()
                .map(|cfg| cfg.add_child(Rc::clone(&leaf)))
                .unwrap_or(false);
            if added {
                mark_children_changed(root, &occ.node, modified);
            }
        }
    }
    Ok(())
}

/// Swap every leaf at each target libtype location for the named library
/// or release. Occurrences already bearing the replacement's full name are
/// skipped.
pub fn replace_libtypes(
    repo: &dyn Repository,
    root: &NodeRef,
    ops: &[RepLibtype],
    modified: &mut ModifiedSet,
    failures: &mut Vec<String>,
) -> Result<(), EditError> {
    info!("Processing libtype configuration replacements");

    for op in ops {
        let key = LibraryKey::new(
            op.target.project.clone(),
            op.target.variant.clone(),
            op.target.libtype.clone(),
            op.new_name.clone(),
        );
        let replacement = repo.resolve_full_name(&FullName::Library(key))?;
        let new_name = replacement.borrow().full_name();

        let occurrences = find_library_occurrences(root, &op.target);
        if occurrences.is_empty() {
            return Err(not_found(op.target.to_string(), root));
        }

        for occ in &occurrences {
            if occ.node.borrow().full_name() == new_name {
                continue;
            }
            info!(
                "Replacing {} with {} from {}",
                occ.node.borrow().full_name(),
                new_name,
                parent_names(&occ.parents)
            );
            for parent in &occ.parents {
                let swapped = parent
                    .borrow_mut()
                    .as_config_mut()
                    .map(|cfg| cfg.replace_child(&occ.node, &replacement))
                    .unwrap_or(false);
                if swapped {
                    mark_children_changed(root, parent, modified);
                } else {
                    let failure = format!(
                        "nothing replaced for {} under {}",
                        occ.node.borrow().full_name(),
                        parent.borrow().full_name()
                    );
                    warn!("{failure}");
                    failures.push(failure);
                }
            }
        }
    }
    Ok(())
}

/// Drop every leaf whose libtype appears in the exclude list.
pub fn exclude_libtypes(
    repo: &dyn Repository,
    root: &NodeRef,
    libtypes: &[Libtype],
    modified: &mut ModifiedSet,
    failures: &mut Vec<String>,
) -> Result<(), EditError> {
    info!("Processing excluded libtypes to remove");
    filter_leaves(repo, root, libtypes, true, modified, failures)
}

/// Drop every leaf whose libtype does not appear in the include list.
pub fn include_libtypes(
    repo: &dyn Repository,
    root: &NodeRef,
    libtypes: &[Libtype],
    modified: &mut ModifiedSet,
    failures: &mut Vec<String>,
) -> Result<(), EditError> {
    info!("Processing libtypes outside the include list to remove");
    filter_leaves(repo, root, libtypes, false, modified, failures)
}

/// Shared body of the include/exclude filters.
///
/// For every composite holding at least one leaf, each listed libtype must
/// resolve against that composite's own identity before any of its leaves
/// are touched; a listed libtype the composite cannot resolve is fatal.
/// Removing nothing is success.
fn filter_leaves(
    repo: &dyn Repository,
    root: &NodeRef,
    listed: &[Libtype],
    drop_listed: bool,
    modified: &mut ModifiedSet,
    failures: &mut Vec<String>,
) -> Result<(), EditError> {
    let composites: Vec<NodeRef> = walk::flatten(root)
        .into_iter()
        .filter(|node| {
            matches!(&*node.borrow(), Node::Config(cfg) if cfg.has_library_children())
        })
        .collect();

    for node in composites {
        let (project, variant, config) = match &*node.borrow() {
            Node::Config(cfg) => (
                cfg.project.clone(),
                cfg.variant.clone(),
                cfg.config.clone(),
            ),
            Node::Library(_) => continue,
        };
        for libtype in listed {
            repo.load(&project, &variant, &config, Some(libtype))?;
        }

        let doomed: Vec<NodeRef> = match node.borrow().as_config() {
            Some(cfg) => cfg
                .children
                .iter()
                .filter(|child| {
                    matches!(
                        &*child.borrow(),
                        Node::Library(lib) if listed.contains(&lib.libtype) == drop_listed
                    )
                })
                .map(Rc::clone)
                .collect(),
            None => continue,
        };

        let mut changed = false;
        for leaf in &doomed {
            info!(
                "Removing {} from {}",
                leaf.borrow().full_name(),
                node.borrow().full_name()
            );
            if unlink(&node, leaf) {
                changed = true;
            } else {
                let failure = format!(
                    "problem removing {} from {}",
                    leaf.borrow().full_name(),
                    node.borrow().full_name()
                );
                warn!("{failure}");
                failures.push(failure);
            }
        }
        if changed {
            mark_children_changed(root, &node, modified);
        }
    }
    Ok(())
}
