//! repo::mock
//!
//! Mock repository implementation for deterministic testing.
//!
//! # Design
//!
//! The mock repository provides an in-memory implementation of the
//! `Repository` trait. Fixture trees are registered up front and handed out
//! by reference, so a test can mutate a session's tree and assert against
//! the very same nodes it built. Builder methods panic on malformed fixture
//! names so broken tests fail loudly at setup.
//!
//! # Example
//!
//! ```
//! use espalier::repo::{MockRepo, Repository};
//! use espalier::core::types::{ConfigName, Project, Variant};
//!
//! let repo = MockRepo::new().with_variant("i10socfm", "liotest1");
//!
//! let project = Project::new("i10socfm").unwrap();
//! let variant = Variant::new("liotest1").unwrap();
//! assert!(repo.variant_exists(&project, &variant).unwrap());
//! assert!(!repo
//!     .config_exists(&project, &variant, &ConfigName::new("dev").unwrap())
//!     .unwrap());
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::core::node::{Node, NodeRef};
use crate::core::types::{
    ConfigKey, ConfigName, FullName, LibraryKey, LibraryName, Libtype, Project, Variant,
};
use crate::core::walk;

use super::traits::{RepoError, Repository};

/// Mock repository for testing.
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct MockRepo {
    inner: Rc<RefCell<MockRepoInner>>,
}

/// Internal mutable state.
#[derive(Debug, Default)]
struct MockRepoInner {
    /// Registered trees, keyed by composite identity. Every composite in a
    /// registered tree is loadable, and loads return the shared node.
    trees: HashMap<ConfigKey, NodeRef>,
    /// Composite identities declared without a tree.
    configs: HashSet<ConfigKey>,
    projects: HashSet<Project>,
    variants: HashSet<(Project, Variant)>,
    libtypes: HashSet<(Project, Variant, Libtype)>,
    /// Declared mutable library streams.
    libraries: HashSet<LibraryKey>,
    /// Declared frozen releases.
    releases: HashSet<LibraryKey>,
    /// Messages returned by `validate`.
    validate_messages: Vec<String>,
    /// Trees handed to `publish`.
    published: Vec<PublishRecord>,
    /// Operation to fail (for testing error paths).
    fail_on: Option<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail load with the given error.
    Load(RepoError),
    /// Fail resolve_full_name with the given error.
    ResolveFullName(RepoError),
    /// Fail every existence check with the given error.
    Exists(RepoError),
    /// Fail validate with the given error.
    Validate(RepoError),
    /// Fail publish with the given error.
    Publish(RepoError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone)]
pub enum MockOperation {
    Load {
        project: Project,
        variant: Variant,
        config: ConfigName,
        libtype: Option<Libtype>,
    },
    ResolveFullName {
        name: FullName,
    },
    Exists {
        what: String,
    },
    Validate {
        root: String,
    },
    Publish {
        root: String,
        renamed: usize,
    },
}

/// One recorded `publish` call.
#[derive(Debug, Clone)]
pub struct PublishRecord {
    pub root: NodeRef,
    pub renamed: Vec<ConfigKey>,
}

impl MockRepo {
    /// Create a new empty mock repository.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(MockRepoInner::default())),
        }
    }

    /// Declare a project/variant pair as existing.
    pub fn with_variant(self, project: &str, variant: &str) -> Self {
        {
            let project = Project::new(project).expect("valid project name");
            let variant = Variant::new(variant).expect("valid variant name");
            let mut inner = self.inner.borrow_mut();
            inner.projects.insert(project.clone());
            inner.variants.insert((project, variant));
        }
        self
    }

    /// Declare a libtype under a project/variant pair.
    pub fn with_libtype(self, project: &str, variant: &str, libtype: &str) -> Self {
        {
            let project = Project::new(project).expect("valid project name");
            let variant = Variant::new(variant).expect("valid variant name");
            let libtype = Libtype::new(libtype).expect("valid libtype name");
            let mut inner = self.inner.borrow_mut();
            inner.projects.insert(project.clone());
            inner.variants.insert((project.clone(), variant.clone()));
            inner.libtypes.insert((project, variant, libtype));
        }
        self
    }

    /// Declare a composite identity ("project/variant@config") without
    /// registering a tree for it.
    pub fn with_config(self, full_name: &str) -> Self {
        {
            let key = ConfigKey::parse(full_name).expect("valid composite full name");
            let mut inner = self.inner.borrow_mut();
            inner.projects.insert(key.project.clone());
            inner
                .variants
                .insert((key.project.clone(), key.variant.clone()));
            inner.configs.insert(key);
        }
        self
    }

    /// Declare a mutable library stream ("project/variant:libtype@library").
    pub fn with_library(self, full_name: &str) -> Self {
        {
            let key = LibraryKey::parse(full_name).expect("valid library full name");
            let mut inner = self.inner.borrow_mut();
            inner.declare_library_location(&key);
            inner.libraries.insert(key);
        }
        self
    }

    /// Declare a frozen release ("project/variant:libtype@RELname").
    pub fn with_release(self, full_name: &str) -> Self {
        {
            let key = LibraryKey::parse(full_name).expect("valid release full name");
            let mut inner = self.inner.borrow_mut();
            inner.declare_library_location(&key);
            inner.releases.insert(key);
        }
        self
    }

    /// Register a fixture tree.
    ///
    /// Every composite in the tree becomes loadable by identity, and every
    /// leaf auto-declares its location and its stream or release, so a test
    /// that builds a tree does not have to declare each piece again.
    pub fn with_tree(self, root: &NodeRef) -> Self {
        {
            let mut inner = self.inner.borrow_mut();
            for node in walk::flatten(root) {
                match &*node.borrow() {
                    Node::Config(cfg) => {
                        inner.projects.insert(cfg.project.clone());
                        inner
                            .variants
                            .insert((cfg.project.clone(), cfg.variant.clone()));
                        inner.trees.insert(cfg.key(), Rc::clone(&node));
                    }
                    Node::Library(lib) => {
                        let key = lib.key();
                        inner.declare_library_location(&key);
                        if lib.library.is_immutable() {
                            inner.releases.insert(key);
                        } else {
                            inner.libraries.insert(key);
                        }
                    }
                }
            }
        }
        self
    }

    /// Make `validate` report the given problems.
    pub fn with_validate_messages<I, S>(self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut inner = self.inner.borrow_mut();
            inner.validate_messages = messages.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Configure the mock to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        {
            let mut inner = self.inner.borrow_mut();
            inner.fail_on = Some(fail_on);
        }
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.inner.borrow_mut().fail_on = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.borrow().operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.inner.borrow_mut().operations.clear();
    }

    /// Get every recorded publish call.
    pub fn published(&self) -> Vec<PublishRecord> {
        self.inner.borrow().published.clone()
    }

    /// Count of publish calls.
    pub fn publish_count(&self) -> usize {
        self.inner.borrow().published.len()
    }

    /// Record an operation.
    fn record(&self, op: MockOperation) {
        self.inner.borrow_mut().operations.push(op);
    }

    /// Return the configured failure for `op`, if any.
    fn check_fail(&self, op: &str) -> Result<(), RepoError> {
        let inner = self.inner.borrow();
        match &inner.fail_on {
            Some(FailOn::Load(e)) if op == "load" => Err(e.clone()),
            Some(FailOn::ResolveFullName(e)) if op == "resolve_full_name" => Err(e.clone()),
            Some(FailOn::Exists(e)) if op == "exists" => Err(e.clone()),
            Some(FailOn::Validate(e)) if op == "validate" => Err(e.clone()),
            Some(FailOn::Publish(e)) if op == "publish" => Err(e.clone()),
            _ => Ok(()),
        }
    }
}

impl Default for MockRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRepoInner {
    fn declare_library_location(&mut self, key: &LibraryKey) {
        self.projects.insert(key.project.clone());
        self.variants
            .insert((key.project.clone(), key.variant.clone()));
        self.libtypes.insert((
            key.project.clone(),
            key.variant.clone(),
            key.libtype.clone(),
        ));
    }
}

impl Repository for MockRepo {
    fn load(
        &self,
        project: &Project,
        variant: &Variant,
        config: &ConfigName,
        libtype: Option<&Libtype>,
    ) -> Result<NodeRef, RepoError> {
        self.record(MockOperation::Load {
            project: project.clone(),
            variant: variant.clone(),
            config: config.clone(),
            libtype: libtype.cloned(),
        });
        self.check_fail("load")?;

        let inner = self.inner.borrow();
        let key = ConfigKey::new(project.clone(), variant.clone(), config.clone());
        let root = inner
            .trees
            .get(&key)
            .ok_or_else(|| RepoError::NotFound(format!("{key} does not exist in the store")))?;

        match libtype {
            None => Ok(Rc::clone(root)),
            Some(libtype) => {
                let root = root.borrow();
                let cfg = root.as_config().ok_or_else(|| {
                    RepoError::Invalid(format!("{key} is not a composite configuration"))
                })?;
                cfg.children
                    .iter()
                    .find(|child| {
                        matches!(&*child.borrow(), Node::Library(lib) if lib.libtype == *libtype)
                    })
                    .map(Rc::clone)
                    .ok_or_else(|| {
                        RepoError::NotFound(format!(
                            "{project}/{variant}:{libtype} is not in configuration {config}"
                        ))
                    })
            }
        }
    }

    fn resolve_full_name(&self, name: &FullName) -> Result<NodeRef, RepoError> {
        self.record(MockOperation::ResolveFullName { name: name.clone() });
        self.check_fail("resolve_full_name")?;

        match name {
            FullName::Config(key) => {
                let inner = self.inner.borrow();
                inner
                    .trees
                    .get(key)
                    .map(Rc::clone)
                    .ok_or_else(|| RepoError::NotFound(format!("{key} does not exist in the store")))
            }
            FullName::Library(key) => {
                let inner = self.inner.borrow();
                if !inner.libraries.contains(key) && !inner.releases.contains(key) {
                    return Err(RepoError::NotFound(format!(
                        "{key} does not exist in the store"
                    )));
                }
                Ok(Node::new_library(
                    key.project.clone(),
                    key.variant.clone(),
                    key.libtype.clone(),
                    key.library.clone(),
                    None,
                ))
            }
        }
    }

    fn project_exists(&self, project: &Project) -> Result<bool, RepoError> {
        self.record(MockOperation::Exists {
            what: format!("project {project}"),
        });
        self.check_fail("exists")?;
        Ok(self.inner.borrow().projects.contains(project))
    }

    fn variant_exists(&self, project: &Project, variant: &Variant) -> Result<bool, RepoError> {
        self.record(MockOperation::Exists {
            what: format!("variant {project}/{variant}"),
        });
        self.check_fail("exists")?;
        Ok(self
            .inner
            .borrow()
            .variants
            .contains(&(project.clone(), variant.clone())))
    }

    fn libtype_exists(
        &self,
        project: &Project,
        variant: &Variant,
        libtype: &Libtype,
    ) -> Result<bool, RepoError> {
        self.record(MockOperation::Exists {
            what: format!("libtype {project}/{variant}:{libtype}"),
        });
        self.check_fail("exists")?;
        Ok(self
            .inner
            .borrow()
            .libtypes
            .contains(&(project.clone(), variant.clone(), libtype.clone())))
    }

    fn config_exists(
        &self,
        project: &Project,
        variant: &Variant,
        config: &ConfigName,
    ) -> Result<bool, RepoError> {
        let key = ConfigKey::new(project.clone(), variant.clone(), config.clone());
        self.record(MockOperation::Exists {
            what: format!("config {key}"),
        });
        self.check_fail("exists")?;
        let inner = self.inner.borrow();
        Ok(inner.trees.contains_key(&key) || inner.configs.contains(&key))
    }

    fn library_exists(
        &self,
        project: &Project,
        variant: &Variant,
        libtype: &Libtype,
        library: &LibraryName,
    ) -> Result<bool, RepoError> {
        let key = LibraryKey::new(
            project.clone(),
            variant.clone(),
            libtype.clone(),
            library.clone(),
        );
        self.record(MockOperation::Exists {
            what: format!("library {key}"),
        });
        self.check_fail("exists")?;
        Ok(self.inner.borrow().libraries.contains(&key))
    }

    fn release_exists(
        &self,
        project: &Project,
        variant: &Variant,
        libtype: &Libtype,
        release: &LibraryName,
    ) -> Result<bool, RepoError> {
        let key = LibraryKey::new(
            project.clone(),
            variant.clone(),
            libtype.clone(),
            release.clone(),
        );
        self.record(MockOperation::Exists {
            what: format!("release {key}"),
        });
        self.check_fail("exists")?;
        Ok(self.inner.borrow().releases.contains(&key))
    }

    fn validate(&self, root: &NodeRef) -> Result<Vec<String>, RepoError> {
        self.record(MockOperation::Validate {
            root: root.borrow().full_name(),
        });
        self.check_fail("validate")?;
        Ok(self.inner.borrow().validate_messages.clone())
    }

    fn publish(&self, root: &NodeRef, modified: &[ConfigKey]) -> Result<(), RepoError> {
        self.record(MockOperation::Publish {
            root: root.borrow().full_name(),
            renamed: modified.len(),
        });
        self.check_fail("publish")?;
        self.inner.borrow_mut().published.push(PublishRecord {
            root: Rc::clone(root),
            renamed: modified.to_vec(),
        });
        Ok(())
    }
}
