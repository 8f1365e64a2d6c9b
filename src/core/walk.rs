//! core::walk
//!
//! Tree traversals and structural surgery over shared nodes.
//!
//! # Architecture
//!
//! Every function here walks down from a root [`NodeRef`]. Nodes carry no
//! reverse pointers, so parent and ancestry questions are answered by
//! recomputing paths on demand. That keeps the answers correct even while a
//! session reshapes the tree between calls.
//!
//! Traversals deduplicate by pointer identity: a node shared by several
//! parents is visited once, but every parent link to it is still observed.
//!
//! # Invariants
//!
//! - Input trees are acyclic; traversals do not defend against cycles
//! - Occurrence and path results are returned in deterministic
//!   first-visit order

use super::node::{Node, NodeRef};
use super::types::{ConfigKey, Fingerprint};
use std::collections::HashMap;
use std::collections::HashSet;
use std::rc::Rc;

fn ptr_id(node: &NodeRef) -> usize {
    Rc::as_ptr(node) as usize
}

/// Collect every node reachable from `root`, including `root` itself.
///
/// Returns pointer-deduplicated nodes in depth-first preorder.
///
/// # Example
///
/// ```
/// use espalier::core::node::Node;
/// use espalier::core::types::{ConfigName, Project, Variant};
/// use espalier::core::walk::flatten;
///
/// let root = Node::new_config(
///     Project::new("p").unwrap(),
///     Variant::new("top").unwrap(),
///     ConfigName::new("dev").unwrap(),
/// );
/// let sub = Node::new_config(
///     Project::new("p").unwrap(),
///     Variant::new("sub").unwrap(),
///     ConfigName::new("dev").unwrap(),
/// );
/// root.borrow_mut().as_config_mut().unwrap().add_child(sub);
///
/// assert_eq!(flatten(&root).len(), 2);
/// ```
pub fn flatten(root: &NodeRef) -> Vec<NodeRef> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    flatten_into(root, &mut seen, &mut out);
    out
}

fn flatten_into(node: &NodeRef, seen: &mut HashSet<usize>, out: &mut Vec<NodeRef>) {
    if !seen.insert(ptr_id(node)) {
        return;
    }
    out.push(Rc::clone(node));
    if let Node::Config(cfg) = &*node.borrow() {
        for child in &cfg.children {
            flatten_into(child, seen, out);
        }
    }
}

/// Check whether `node` is reachable from `root` (pointer identity).
pub fn contains(root: &NodeRef, node: &NodeRef) -> bool {
    let mut memo = HashMap::new();
    reaches(root, node, &mut memo)
}

/// A node matched by a search, together with every composite that links it.
///
/// The same shared node yields one occurrence listing all its parents. Two
/// distinct nodes with equal identities yield two occurrences.
#[derive(Debug)]
pub struct Occurrence {
    pub node: NodeRef,
    /// Direct parents in first-visit order. Empty when the match is the
    /// root itself.
    pub parents: Vec<NodeRef>,
}

/// Find every node matching a predicate, with its direct parents.
///
/// The root participates in matching like any other node; a matching root
/// appears with an empty parent list.
pub fn find_occurrences<F>(root: &NodeRef, matches: F) -> Vec<Occurrence>
where
    F: Fn(&Node) -> bool,
{
    let mut occurrences: Vec<Occurrence> = Vec::new();
    let mut index: HashMap<usize, usize> = HashMap::new();

    if matches(&root.borrow()) {
        index.insert(ptr_id(root), 0);
        occurrences.push(Occurrence {
            node: Rc::clone(root),
            parents: Vec::new(),
        });
    }

    for parent in flatten(root) {
        let children: Vec<NodeRef> = match &*parent.borrow() {
            Node::Config(cfg) => cfg.children.iter().map(Rc::clone).collect(),
            Node::Library(_) => continue,
        };
        for child in children {
            if !matches(&child.borrow()) {
                continue;
            }
            let slot = *index.entry(ptr_id(&child)).or_insert_with(|| {
                occurrences.push(Occurrence {
                    node: Rc::clone(&child),
                    parents: Vec::new(),
                });
                occurrences.len() - 1
            });
            let parents = &mut occurrences[slot].parents;
            if !parents.iter().any(|p| Rc::ptr_eq(p, &parent)) {
                parents.push(Rc::clone(&parent));
            }
        }
    }

    occurrences
}

/// Collect every node lying on some `root` → `target` path, endpoints
/// included. Returns an empty list when `target` is unreachable.
///
/// A node X is on such a path exactly when X is reachable from `root` and
/// `target` is reachable from X, so this runs in linear time over the
/// shared structure rather than enumerating paths.
pub fn nodes_on_paths_to(root: &NodeRef, target: &NodeRef) -> Vec<NodeRef> {
    let mut memo = HashMap::new();
    flatten(root)
        .into_iter()
        .filter(|node| reaches(node, target, &mut memo))
        .collect()
}

/// Collect the immutable nodes lying on some `root` → `target` path,
/// endpoints included.
///
/// This is the re-identification closure: when an immutable composite's
/// children change, every immutable node on a path leading to it must be
/// renamed before the tree can be published again.
pub fn immutable_on_paths(root: &NodeRef, target: &NodeRef) -> Vec<NodeRef> {
    nodes_on_paths_to(root, target)
        .into_iter()
        .filter(|node| node.borrow().is_immutable())
        .collect()
}

fn reaches(node: &NodeRef, target: &NodeRef, memo: &mut HashMap<usize, bool>) -> bool {
    if Rc::ptr_eq(node, target) {
        return true;
    }
    let id = ptr_id(node);
    if let Some(&known) = memo.get(&id) {
        return known;
    }
    let result = match &*node.borrow() {
        Node::Config(cfg) => cfg
            .children
            .iter()
            .any(|child| reaches(child, target, memo)),
        Node::Library(_) => false,
    };
    memo.insert(id, result);
    result
}

/// The longest `root` → `target` path length in edges, or `None` when
/// `target` is unreachable.
///
/// Replacements run in increasing order of this value, so a swap deeper in
/// the tree still sees subtrees that shallower swaps grafted in.
pub fn max_depth_of(root: &NodeRef, target: &NodeRef) -> Option<usize> {
    let mut memo = HashMap::new();
    max_depth_from(root, target, &mut memo)
}

fn max_depth_from(
    node: &NodeRef,
    target: &NodeRef,
    memo: &mut HashMap<usize, Option<usize>>,
) -> Option<usize> {
    if Rc::ptr_eq(node, target) {
        return Some(0);
    }
    let id = ptr_id(node);
    if let Some(known) = memo.get(&id) {
        return *known;
    }
    let result = match &*node.borrow() {
        Node::Config(cfg) => cfg
            .children
            .iter()
            .filter_map(|child| max_depth_from(child, target, memo))
            .max()
            .map(|d| d + 1),
        Node::Library(_) => None,
    };
    memo.insert(id, result);
    result
}

/// Remove empty composite nodes from their parents until none remain.
///
/// The root is never pruned, even when it ends up with no children.
/// Returns the identities of the pruned composites in removal order.
pub fn prune_empty_configs(root: &NodeRef) -> Vec<ConfigKey> {
    let mut pruned = Vec::new();
    loop {
        let nodes = flatten(root);
        let empties: Vec<NodeRef> = nodes
            .iter()
            .filter(|node| !Rc::ptr_eq(node, root))
            .filter(|node| {
                matches!(&*node.borrow(), Node::Config(cfg) if cfg.children.is_empty())
            })
            .map(Rc::clone)
            .collect();
        if empties.is_empty() {
            return pruned;
        }
        for empty in &empties {
            if let Some(cfg) = empty.borrow().as_config() {
                pruned.push(cfg.key());
            }
        }
        for parent in &nodes {
            let mut parent = parent.borrow_mut();
            if let Some(cfg) = parent.as_config_mut() {
                for empty in &empties {
                    cfg.remove_child(empty);
                }
            }
        }
    }
}

/// Render one description line per node and per parent→child edge.
///
/// Leaf lines carry the change reference when one is pinned. The manifest
/// is the input to [`fingerprint`] and is also what the store persists.
pub fn manifest(root: &NodeRef) -> Vec<String> {
    let mut lines = Vec::new();
    for node in flatten(root) {
        let node = node.borrow();
        match &*node {
            Node::Config(cfg) => {
                lines.push(node.full_name());
                for child in &cfg.children {
                    lines.push(format!("{} -> {}", node.full_name(), child.borrow().full_name()));
                }
            }
            Node::Library(lib) => match &lib.change_ref {
                Some(change_ref) => lines.push(format!("{}#{}", node.full_name(), change_ref)),
                None => lines.push(node.full_name()),
            },
        }
    }
    lines
}

/// Hash a tree's shape into a stable fingerprint.
pub fn fingerprint(root: &NodeRef) -> Fingerprint {
    Fingerprint::compute(&manifest(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ConfigName, LibraryName, Libtype, Project, Variant};

    fn config(project: &str, variant: &str, name: &str) -> NodeRef {
        Node::new_config(
            Project::new(project).unwrap(),
            Variant::new(variant).unwrap(),
            ConfigName::new(name).unwrap(),
        )
    }

    fn library(project: &str, variant: &str, libtype: &str, name: &str) -> NodeRef {
        Node::new_library(
            Project::new(project).unwrap(),
            Variant::new(variant).unwrap(),
            Libtype::new(libtype).unwrap(),
            LibraryName::new(name).unwrap(),
            None,
        )
    }

    fn link(parent: &NodeRef, child: &NodeRef) {
        parent
            .borrow_mut()
            .as_config_mut()
            .unwrap()
            .children
            .push(Rc::clone(child));
    }

    /// root -> [to_del, not_to_del -> [to_del]], every config immutable.
    ///
    /// The shape used throughout: `to_del` is shared by two parents.
    fn shared_diamond() -> (NodeRef, NodeRef, NodeRef) {
        let root = config("p", "root", "REL--root");
        let to_del = config("p", "to_del", "REL--to_del");
        let not_to_del = config("p", "not_to_del", "REL--not_to_del");
        link(&root, &to_del);
        link(&root, &not_to_del);
        link(&not_to_del, &to_del);
        (root, to_del, not_to_del)
    }

    #[test]
    fn flatten_dedups_shared_nodes() {
        let (root, _, _) = shared_diamond();
        let nodes = flatten(&root);
        assert_eq!(nodes.len(), 3);
        assert!(Rc::ptr_eq(&nodes[0], &root));
    }

    #[test]
    fn contains_follows_pointers() {
        let (root, to_del, _) = shared_diamond();
        assert!(contains(&root, &to_del));

        let stranger = config("p", "to_del", "REL--to_del");
        assert!(!contains(&root, &stranger));
    }

    #[test]
    fn occurrences_collect_all_parents_of_shared_node() {
        let (root, to_del, not_to_del) = shared_diamond();
        let wanted = to_del.borrow().location();
        let found = find_occurrences(&root, |node| {
            node.is_config() && node.location() == wanted
        });

        assert_eq!(found.len(), 1);
        assert!(Rc::ptr_eq(&found[0].node, &to_del));
        assert_eq!(found[0].parents.len(), 2);
        assert!(Rc::ptr_eq(&found[0].parents[0], &root));
        assert!(Rc::ptr_eq(&found[0].parents[1], &not_to_del));
    }

    #[test]
    fn occurrences_keep_value_equal_twins_apart() {
        let root = config("p", "root", "dev");
        let left = config("p", "mid", "dev");
        let right = config("p", "mid", "dev");
        link(&root, &left);
        link(&root, &right);

        let found = find_occurrences(&root, |node| {
            node.is_config() && node.variant().as_str() == "mid"
        });
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn matching_root_has_no_parents() {
        let (root, _, _) = shared_diamond();
        let found = find_occurrences(&root, |node| node.variant().as_str() == "root");
        assert_eq!(found.len(), 1);
        assert!(found[0].parents.is_empty());
    }

    #[test]
    fn paths_to_shared_node_cover_both_routes() {
        let (root, to_del, not_to_del) = shared_diamond();
        let on_paths = nodes_on_paths_to(&root, &to_del);

        assert_eq!(on_paths.len(), 3);
        assert!(on_paths.iter().any(|n| Rc::ptr_eq(n, &root)));
        assert!(on_paths.iter().any(|n| Rc::ptr_eq(n, &not_to_del)));
        assert!(on_paths.iter().any(|n| Rc::ptr_eq(n, &to_del)));
    }

    #[test]
    fn paths_to_unreachable_node_are_empty() {
        let (root, _, _) = shared_diamond();
        let elsewhere = config("p", "other", "dev");
        assert!(nodes_on_paths_to(&root, &elsewhere).is_empty());
    }

    #[test]
    fn immutable_closure_skips_mutable_links() {
        // root(REL) -> mid(dev) -> leaf_cfg(REL)
        let root = config("p", "root", "REL--root");
        let mid = config("p", "mid", "dev");
        let leaf_cfg = config("p", "leaf", "REL--leaf");
        link(&root, &mid);
        link(&mid, &leaf_cfg);

        let closure = immutable_on_paths(&root, &leaf_cfg);
        assert_eq!(closure.len(), 2);
        assert!(closure.iter().any(|n| Rc::ptr_eq(n, &root)));
        assert!(closure.iter().any(|n| Rc::ptr_eq(n, &leaf_cfg)));
        assert!(!closure.iter().any(|n| Rc::ptr_eq(n, &mid)));
    }

    #[test]
    fn immutable_closure_sees_every_ancestor_path() {
        let (root, to_del, not_to_del) = shared_diamond();
        let closure = immutable_on_paths(&root, &to_del);
        assert_eq!(closure.len(), 3);
        assert!(closure.iter().any(|n| Rc::ptr_eq(n, &root)));
        assert!(closure.iter().any(|n| Rc::ptr_eq(n, &not_to_del)));
        assert!(closure.iter().any(|n| Rc::ptr_eq(n, &to_del)));
    }

    #[test]
    fn max_depth_takes_longest_route() {
        let (root, to_del, _) = shared_diamond();
        // Direct route is one edge, the route through not_to_del is two.
        assert_eq!(max_depth_of(&root, &to_del), Some(2));
        assert_eq!(max_depth_of(&root, &root), Some(0));

        let elsewhere = config("p", "other", "dev");
        assert_eq!(max_depth_of(&root, &elsewhere), None);
    }

    #[test]
    fn prune_removes_cascading_empties() {
        // root -> mid -> empty; removing empty leaves mid empty too.
        let root = config("p", "root", "dev");
        let mid = config("p", "mid", "dev");
        let empty = config("p", "bottom", "dev");
        link(&root, &mid);
        link(&mid, &empty);

        let pruned = prune_empty_configs(&root);

        assert_eq!(pruned.len(), 2);
        assert_eq!(pruned[0].to_string(), "p/bottom@dev");
        assert_eq!(pruned[1].to_string(), "p/mid@dev");
        assert!(root.borrow().as_config().unwrap().children.is_empty());
    }

    #[test]
    fn prune_keeps_populated_configs_and_root() {
        let root = config("p", "root", "dev");
        let mid = config("p", "mid", "dev");
        link(&root, &mid);
        link(&mid, &library("p", "mid", "rtl", "dev"));

        assert!(prune_empty_configs(&root).is_empty());
        assert_eq!(root.borrow().as_config().unwrap().children.len(), 1);

        // An empty root is left alone.
        let bare = config("p", "root", "dev");
        assert!(prune_empty_configs(&bare).is_empty());
    }

    #[test]
    fn fingerprint_ignores_traversal_order_but_not_shape() {
        let (root_a, _, _) = shared_diamond();
        let (root_b, _, _) = shared_diamond();
        assert_eq!(fingerprint(&root_a), fingerprint(&root_b));

        let (root_c, to_del, _) = shared_diamond();
        root_c.borrow_mut().as_config_mut().unwrap().remove_child(&to_del);
        assert_ne!(fingerprint(&root_a), fingerprint(&root_c));
    }

    #[test]
    fn manifest_carries_change_refs() {
        let root = config("p", "root", "dev");
        let pinned = Node::new_library(
            Project::new("p").unwrap(),
            Variant::new("root").unwrap(),
            Libtype::new("rtl").unwrap(),
            LibraryName::new("dev").unwrap(),
            Some(crate::core::types::ChangeRef::new("12345").unwrap()),
        );
        link(&root, &pinned);

        let lines = manifest(&root);
        assert!(lines.iter().any(|l| l == "p/root:rtl@dev#12345"));
    }
}
