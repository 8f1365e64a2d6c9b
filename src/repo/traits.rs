//! repo::traits
//!
//! Repository trait definition for the backing store of BOM trees.
//!
//! # Design
//!
//! The engine never talks to storage directly. Everything it needs from the
//! outside world goes through [`Repository`]: loading trees, resolving full
//! names, answering existence questions, structural validation, and the
//! final publish. Implementations decide what "storage" means; the engine
//! only decides what to ask and how to react to failures.
//!
//! Sessions are single-threaded and synchronous, so the trait is sync and
//! carries no thread-safety bounds.
//!
//! # Example
//!
//! ```
//! use espalier::repo::{MockRepo, Repository};
//! use espalier::core::types::{Project, Variant};
//!
//! let repo = MockRepo::new().with_variant("i10socfm", "liotest1");
//! let project = Project::new("i10socfm").unwrap();
//! let variant = Variant::new("liotest1").unwrap();
//! assert!(repo.variant_exists(&project, &variant).unwrap());
//! ```

use crate::core::node::NodeRef;
use crate::core::types::{
    ConfigKey, ConfigName, FullName, LibraryName, Libtype, Project, Variant,
};
use crate::core::walk;
use thiserror::Error;

/// Errors from repository operations.
///
/// Implementations map their internal failures (I/O, locking, parsing)
/// into these variants at the trait boundary. The variants stay cloneable
/// so test doubles can replay stored errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepoError {
    /// The requested identity does not exist in the store. The message is
    /// a complete sentence naming the identity, written by the
    /// implementation that failed to find it.
    #[error("{0}")]
    NotFound(String),

    /// The store could not be read or written.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store content is malformed or self-contradictory.
    #[error("invalid store content: {0}")]
    Invalid(String),
}

/// The Repository trait for the store behind an edit session.
///
/// # Error Handling
///
/// All methods return `Result<T, RepoError>`. How a failure is treated is
/// the caller's decision, not the repository's: a failed `load` aborts a
/// session, while a failed `publish` is recorded and reported alongside
/// other problems.
pub trait Repository {
    /// Load a node by identity.
    ///
    /// With `libtype = None`, loads the composite config
    /// `project/variant@config` with its full subtree; shared subconfigs
    /// must come back as shared nodes, not copies.
    ///
    /// With `libtype = Some(l)`, loads the library leaf that `config` pins
    /// for `l` in that variant.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the identity does not exist, or the config pins no
    ///   library for the requested libtype
    fn load(
        &self,
        project: &Project,
        variant: &Variant,
        config: &ConfigName,
        libtype: Option<&Libtype>,
    ) -> Result<NodeRef, RepoError>;

    /// Resolve a parsed `project/variant[:libtype]@name` full name to a
    /// node. Config names load their whole subtree, library names load a
    /// single leaf.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the name does not denote a stored identity
    fn resolve_full_name(&self, name: &FullName) -> Result<NodeRef, RepoError>;

    /// Check whether a project exists.
    fn project_exists(&self, project: &Project) -> Result<bool, RepoError>;

    /// Check whether a variant exists within a project.
    fn variant_exists(&self, project: &Project, variant: &Variant) -> Result<bool, RepoError>;

    /// Check whether a libtype exists within a variant.
    fn libtype_exists(
        &self,
        project: &Project,
        variant: &Variant,
        libtype: &Libtype,
    ) -> Result<bool, RepoError>;

    /// Check whether a config exists within a variant.
    fn config_exists(
        &self,
        project: &Project,
        variant: &Variant,
        config: &ConfigName,
    ) -> Result<bool, RepoError>;

    /// Check whether a mutable library stream exists for a libtype.
    fn library_exists(
        &self,
        project: &Project,
        variant: &Variant,
        libtype: &Libtype,
        library: &LibraryName,
    ) -> Result<bool, RepoError>;

    /// Check whether a frozen release exists for a libtype.
    fn release_exists(
        &self,
        project: &Project,
        variant: &Variant,
        libtype: &Libtype,
        release: &LibraryName,
    ) -> Result<bool, RepoError>;

    /// Structurally validate a tree against the store.
    ///
    /// Returns one message per problem found; an empty list means the tree
    /// is valid. Messages are user-facing and must name the offending
    /// identity.
    fn validate(&self, root: &NodeRef) -> Result<Vec<String>, RepoError>;

    /// Remove empty composite nodes from the tree.
    ///
    /// The default walks the in-memory tree; implementations with their
    /// own notion of emptiness may override. Returns the pruned
    /// identities.
    fn remove_empty_configs(&self, root: &NodeRef) -> Result<Vec<ConfigKey>, RepoError> {
        Ok(walk::prune_empty_configs(root))
    }

    /// Persist a finished tree.
    ///
    /// `modified` lists the composite identities the session renamed;
    /// implementations write those as new records and never touch the
    /// records of the identities they were renamed from.
    ///
    /// # Errors
    ///
    /// - `Unavailable` if the store cannot be written; the session reports
    ///   this as a degraded result rather than aborting
    fn publish(&self, root: &NodeRef, modified: &[ConfigKey]) -> Result<(), RepoError>;
}
