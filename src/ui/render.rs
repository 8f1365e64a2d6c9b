//! ui::render
//!
//! Indented report of a BOM tree.
//!
//! One line per node, tab-indented by depth. Under a composite, library
//! leaves print before subconfigs and each group sorts by full name.
//! Shared subtrees print in full at every occurrence, so the report shows
//! the tree as consumers resolve it, not as it is stored.

use std::rc::Rc;

use crate::core::node::{Node, NodeRef};

/// Render `root` and everything under it.
pub fn report(root: &NodeRef) -> String {
    let mut out = String::new();
    render_node(root, 0, &mut out);
    out
}

fn render_node(node: &NodeRef, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push('\t');
    }
    out.push_str(&node.borrow().full_name());
    out.push('\n');

    let (mut leaves, mut configs): (Vec<(String, NodeRef)>, Vec<(String, NodeRef)>) =
        match &*node.borrow() {
            Node::Config(cfg) => cfg
                .children
                .iter()
                .map(|child| (child.borrow().full_name(), Rc::clone(child)))
                .partition(|(_, child)| child.borrow().is_library()),
            Node::Library(_) => return,
        };
    leaves.sort_by(|a, b| a.0.cmp(&b.0));
    configs.sort_by(|a, b| a.0.cmp(&b.0));

    for (_, child) in leaves.into_iter().chain(configs) {
        render_node(&child, depth + 1, out);
    }
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

    #[test]
    fn a_leaf_reports_as_a_single_line() {
        let leaf = library("p", "v", "rtl", "dev");
        assert_eq!(report(&leaf), "p/v:rtl@dev\n");
    }

    #[test]
    fn leaves_print_before_subconfigs_and_both_sort_by_name() {
        let root = config("p", "root", "REL--root");
        let ab = config("p", "ab", "dev");
        let aa = config("p", "aa", "dev");
        link(&root, &ab);
        link(&root, &library("p", "root", "rtl", "REL--r"));
        link(&root, &aa);
        link(&ab, &library("p", "ab", "oa", "dev"));

        insta::assert_snapshot!(report(&root), @r"
p/root@REL--root
	p/root:rtl@REL--r
	p/aa@dev
	p/ab@dev
		p/ab:oa@dev
");
    }

    #[test]
    fn shared_subtrees_expand_at_every_occurrence() {
        let root = config("p", "root", "dev");
        let left = config("p", "left", "dev");
        let right = config("p", "right", "dev");
        let shared = config("p", "shared", "dev");
        link(&root, &left);
        link(&root, &right);
        link(&left, &shared);
        link(&right, &shared);
        link(&shared, &library("p", "shared", "rtl", "dev"));

        let out = report(&root);
        assert_eq!(out.matches("p/shared@dev").count(), 2);
        assert_eq!(out.matches("p/shared:rtl@dev").count(), 2);
    }
}
