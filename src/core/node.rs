//! core::node
//!
//! In-memory BOM tree representation.
//!
//! # Architecture
//!
//! A tree is built from two node kinds:
//! - [`Node::Config`] - a composite config with an ordered child list
//! - [`Node::Library`] - a library leaf pinning one libtype to a library
//!
//! Nodes are shared through [`NodeRef`] (`Rc<RefCell<Node>>`). The same
//! config can appear under several parents, which makes the structure a DAG
//! rather than a strict tree. Parents hold no reverse pointers; ancestry is
//! always recomputed by walking down from the root.
//!
//! # Identity vs sharing
//!
//! Two notions of sameness coexist and must not be confused:
//! - Value equality (`==`) compares identity fields only. Children and
//!   change references are excluded. Searches match on value equality.
//! - Pointer identity (`Rc::ptr_eq`) distinguishes occurrences. Tree
//!   surgery (remove, replace) operates on pointer identity so that two
//!   distinct nodes with equal identities are never conflated.
//!
//! # Invariants
//!
//! - Only config nodes have children; library nodes are always leaves
//! - Trees are acyclic; surgery helpers never link a node under itself

use super::types::{
    ChangeRef, ConfigKey, ConfigName, LibraryKey, LibraryName, Libtype, LibtypeKey, Project,
    Variant, VariantKey,
};
use std::cell::RefCell;
use std::rc::Rc;

/// A shared handle to a tree node.
pub type NodeRef = Rc<RefCell<Node>>;

/// A node in a BOM tree.
///
/// # Example
///
/// ```
/// use espalier::core::node::Node;
/// use espalier::core::types::{ConfigName, LibraryName, Libtype, Project, Variant};
///
/// let root = Node::new_config(
///     Project::new("i10socfm").unwrap(),
///     Variant::new("liotest1").unwrap(),
///     ConfigName::new("dev").unwrap(),
/// );
/// let leaf = Node::new_library(
///     Project::new("i10socfm").unwrap(),
///     Variant::new("liotest1").unwrap(),
///     Libtype::new("rtl").unwrap(),
///     LibraryName::new("dev").unwrap(),
///     None,
/// );
///
/// root.borrow_mut().as_config_mut().unwrap().add_child(leaf);
/// assert_eq!(root.borrow().full_name(), "i10socfm/liotest1@dev");
/// ```
#[derive(Debug)]
pub enum Node {
    Config(ConfigNode),
    Library(LibraryNode),
}

/// A composite config: an ordered list of child nodes.
#[derive(Debug)]
pub struct ConfigNode {
    pub project: Project,
    pub variant: Variant,
    pub config: ConfigName,
    /// Ordered children. Order is preserved by all surgery helpers.
    pub children: Vec<NodeRef>,
}

/// A library leaf: one libtype pinned to a library, optionally at a
/// specific change reference.
#[derive(Debug)]
pub struct LibraryNode {
    pub project: Project,
    pub variant: Variant,
    pub libtype: Libtype,
    pub library: LibraryName,
    pub change_ref: Option<ChangeRef>,
}

impl Node {
    /// Create a config node with no children.
    pub fn new_config(project: Project, variant: Variant, config: ConfigName) -> NodeRef {
        Rc::new(RefCell::new(Node::Config(ConfigNode {
            project,
            variant,
            config,
            children: Vec::new(),
        })))
    }

    /// Create a library leaf.
    pub fn new_library(
        project: Project,
        variant: Variant,
        libtype: Libtype,
        library: LibraryName,
        change_ref: Option<ChangeRef>,
    ) -> NodeRef {
        Rc::new(RefCell::new(Node::Library(LibraryNode {
            project,
            variant,
            libtype,
            library,
            change_ref,
        })))
    }

    pub fn project(&self) -> &Project {
        match self {
            Node::Config(c) => &c.project,
            Node::Library(l) => &l.project,
        }
    }

    pub fn variant(&self) -> &Variant {
        match self {
            Node::Config(c) => &c.variant,
            Node::Library(l) => &l.variant,
        }
    }

    /// The node's own name: the config name for composites, the library
    /// name for leaves.
    pub fn name(&self) -> &str {
        match self {
            Node::Config(c) => c.config.as_str(),
            Node::Library(l) => l.library.as_str(),
        }
    }

    /// The `project/variant` location of this node.
    pub fn location(&self) -> VariantKey {
        VariantKey::new(self.project().clone(), self.variant().clone())
    }

    /// Render the node's full name.
    ///
    /// Configs format as `project/variant@config`, leaves as
    /// `project/variant:libtype@library`.
    pub fn full_name(&self) -> String {
        match self {
            Node::Config(c) => c.key().to_string(),
            Node::Library(l) => l.key().to_string(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Node::Config(_))
    }

    pub fn is_library(&self) -> bool {
        matches!(self, Node::Library(_))
    }

    /// Check whether this node's name marks it immutable.
    pub fn is_immutable(&self) -> bool {
        match self {
            Node::Config(c) => c.config.is_immutable(),
            Node::Library(l) => l.library.is_immutable(),
        }
    }

    pub fn is_mutable(&self) -> bool {
        !self.is_immutable()
    }

    pub fn as_config(&self) -> Option<&ConfigNode> {
        match self {
            Node::Config(c) => Some(c),
            Node::Library(_) => None,
        }
    }

    pub fn as_config_mut(&mut self) -> Option<&mut ConfigNode> {
        match self {
            Node::Config(c) => Some(c),
            Node::Library(_) => None,
        }
    }

    pub fn as_library(&self) -> Option<&LibraryNode> {
        match self {
            Node::Library(l) => Some(l),
            Node::Config(_) => None,
        }
    }
}

/// Value equality compares identity fields only. Children and change
/// references do not participate, so a search for `p/v@cfg` matches every
/// occurrence regardless of subtree contents.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Config(a), Node::Config(b)) => {
                a.project == b.project && a.variant == b.variant && a.config == b.config
            }
            (Node::Library(a), Node::Library(b)) => {
                a.project == b.project
                    && a.variant == b.variant
                    && a.libtype == b.libtype
                    && a.library == b.library
            }
            _ => false,
        }
    }
}

impl Eq for Node {}

impl ConfigNode {
    /// The `project/variant@config` identity of this composite.
    pub fn key(&self) -> ConfigKey {
        ConfigKey::new(
            self.project.clone(),
            self.variant.clone(),
            self.config.clone(),
        )
    }

    /// Append a child, skipping when a value-equal child is already
    /// present. Returns true if the child was added.
    pub fn add_child(&mut self, child: NodeRef) -> bool {
        if self
            .children
            .iter()
            .any(|c| Rc::ptr_eq(c, &child) || *c.borrow() == *child.borrow())
        {
            return false;
        }
        self.children.push(child);
        true
    }

    /// Remove every occurrence of `child` by pointer identity. Returns
    /// true if at least one occurrence was removed.
    pub fn remove_child(&mut self, child: &NodeRef) -> bool {
        let before = self.children.len();
        self.children.retain(|c| !Rc::ptr_eq(c, child));
        self.children.len() != before
    }

    /// Replace every occurrence of `old` (by pointer identity) with `new`,
    /// preserving child order. Returns true if at least one occurrence was
    /// replaced.
    pub fn replace_child(&mut self, old: &NodeRef, new: &NodeRef) -> bool {
        let mut replaced = false;
        for slot in &mut self.children {
            if Rc::ptr_eq(slot, old) {
                *slot = Rc::clone(new);
                replaced = true;
            }
        }
        replaced
    }

    /// Check whether any direct child is a library leaf for `libtype`.
    pub fn has_libtype(&self, libtype: &Libtype) -> bool {
        self.children
            .iter()
            .any(|c| matches!(&*c.borrow(), Node::Library(l) if l.libtype == *libtype))
    }

    /// Check whether any direct child is a library leaf.
    pub fn has_library_children(&self) -> bool {
        self.children.iter().any(|c| c.borrow().is_library())
    }
}

impl LibraryNode {
    /// The `project/variant:libtype@library` identity of this leaf.
    pub fn key(&self) -> LibraryKey {
        LibraryKey::new(
            self.project.clone(),
            self.variant.clone(),
            self.libtype.clone(),
            self.library.clone(),
        )
    }

    /// The `project/variant:libtype` location of this leaf.
    pub fn location(&self) -> LibtypeKey {
        LibtypeKey::new(
            self.project.clone(),
            self.variant.clone(),
            self.libtype.clone(),
        )
    }
}
