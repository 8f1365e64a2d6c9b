//! ops::request
//!
//! Raw edit requests and their validation into typed plans.
//!
//! # Validation
//!
//! An [`EditRequest`] is checked in a fixed order, and the first failure
//! wins:
//!
//! 1. syntactic shape of every operation entry, independent of any store
//! 2. session mode: exactly one of inplace or a new configuration name,
//!    and at least one operation
//! 3. reserved and immutable name rules for the chosen mode
//! 4. existence of every referenced identity in the repository
//! 5. an inplace session's root must be mutable
//!
//! Steps 1 through 3 are [`EditRequest::parse`]; steps 4 and 5 are
//! [`EditPlan::check`] against a repository. Both must pass before a tree
//! is loaded.
//!
//! # Example
//!
//! ```
//! use espalier::ops::EditRequest;
//!
//! let request = EditRequest {
//!     project: "i10socfm".to_string(),
//!     variant: "liotest1".to_string(),
//!     config: "REL3.0".to_string(),
//!     new_config: Some("fixup".to_string()),
//!     del_libtypes: vec!["i10socfm/liotest1:rtl".to_string()],
//!     ..EditRequest::default()
//! };
//!
//! let plan = request.parse().unwrap();
//! assert_eq!(plan.root.to_string(), "i10socfm/liotest1@REL3.0");
//! assert_eq!(plan.ops.del_libtypes.len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{
    ConfigKey, ConfigName, LibraryKey, LibraryName, Libtype, LibtypeKey, Project, TypeError,
    Variant, VariantKey,
};
use crate::repo::{RepoError, Repository};

/// A fatal error raised while turning a request into a runnable session.
///
/// Construction errors always fire before any tree is loaded or mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    #[error(transparent)]
    Format(#[from] TypeError),

    #[error("malformed operation entry: expected {expected}, got {got} values")]
    EntryShape { expected: &'static str, got: usize },

    #[error("one of inplace or a new configuration name must be chosen")]
    ModeMissing,

    #[error("inplace and a new configuration name are mutually exclusive")]
    ModeConflict,

    #[error("at least one edit operation must be given")]
    NoOperations,

    #[error("the reserved configuration name {0} cannot be edited in place")]
    ReservedInPlace(ConfigName),

    #[error("the reserved configuration name {0} cannot be used as a new configuration name")]
    ReservedNewName(ConfigName),

    #[error("a new configuration name cannot use an immutable prefix: {0}")]
    ImmutableNewName(ConfigName),

    #[error("{0} is immutable and cannot be edited in place; a new configuration name is required")]
    ImmutableRoot(ConfigKey),

    #[error("{name} does not exist (expected an existing {expected})")]
    Missing { name: String, expected: &'static str },

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// The raw, stringly-typed session surface.
///
/// This is what the CLI flags and plan files deserialize into. Everything
/// here is unchecked text; [`parse`](EditRequest::parse) turns it into
/// typed operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditRequest {
    pub project: String,
    pub variant: String,
    pub config: String,
    pub inplace: bool,
    pub new_config: Option<String>,
    /// `(source "p/v@config", target "p/v")` pairs.
    pub add_configs: Vec<(String, String)>,
    /// `[target "p/v", parent "p/v"...]` entries; parents scope the delete.
    pub del_configs: Vec<Vec<String>>,
    /// `(target "p/v", new_config_name)` pairs.
    pub rep_configs: Vec<(String, String)>,
    /// `[source "p/v:libtype@library"]` or `[source, config_scope]` entries.
    pub add_libtypes: Vec<Vec<String>>,
    /// `target "p/v:libtype"` entries.
    pub del_libtypes: Vec<String>,
    /// `(target "p/v:libtype", new_library_name)` pairs.
    pub rep_libtypes: Vec<(String, String)>,
    pub include_libtypes: Vec<String>,
    pub exclude_libtypes: Vec<String>,
    pub preview: bool,
}

/// Add one stored config under every occurrence of a target location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddConfig {
    pub source: ConfigKey,
    pub target: VariantKey,
}

/// Delete every config at a location, optionally scoped to parents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelConfig {
    pub target: VariantKey,
    /// When non-empty, only unlink from parents at these locations.
    pub parents: Vec<VariantKey>,
}

/// Swap every config at a location for the one named `new_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepConfig {
    pub target: VariantKey,
    pub new_name: ConfigName,
}

/// Add a library leaf under every matching composite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddLibtype {
    pub source: LibraryKey,
    /// When set, only composites with this config name receive the leaf.
    pub scope: Option<ConfigName>,
}

/// Delete every leaf pinning a libtype at a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelLibtype {
    pub target: LibtypeKey,
}

/// Swap every leaf at a libtype location for the library named `new_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepLibtype {
    pub target: LibtypeKey,
    pub new_name: LibraryName,
}

/// How the session writes its result back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditMode {
    /// Mutate the root config itself. Only valid for mutable roots.
    InPlace,
    /// Re-identify every touched immutable config (and the root) under a
    /// fresh name.
    NewConfig(ConfigName),
}

/// The typed operations of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOps {
    pub add_configs: Vec<AddConfig>,
    pub del_configs: Vec<DelConfig>,
    pub rep_configs: Vec<RepConfig>,
    pub add_libtypes: Vec<AddLibtype>,
    pub del_libtypes: Vec<DelLibtype>,
    pub rep_libtypes: Vec<RepLibtype>,
    pub include_libtypes: Vec<Libtype>,
    pub exclude_libtypes: Vec<Libtype>,
}

impl EditOps {
    pub fn is_empty(&self) -> bool {
        self.add_configs.is_empty()
            && self.del_configs.is_empty()
            && self.rep_configs.is_empty()
            && self.add_libtypes.is_empty()
            && self.del_libtypes.is_empty()
            && self.rep_libtypes.is_empty()
            && self.include_libtypes.is_empty()
            && self.exclude_libtypes.is_empty()
    }
}

/// A syntactically valid session, not yet checked against a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPlan {
    pub root: ConfigKey,
    pub mode: EditMode,
    pub ops: EditOps,
    pub preview: bool,
}

impl EditRequest {
    /// Run validation steps 1 through 3 and produce a typed plan.
    pub fn parse(&self) -> Result<EditPlan, ConstructionError> {
        let root = ConfigKey::new(
            Project::new(&self.project)?,
            Variant::new(&self.variant)?,
            ConfigName::new(&self.config)?,
        );

        let mut ops = EditOps::default();
        for (source, target) in &self.add_configs {
            ops.add_configs.push(AddConfig {
                source: ConfigKey::parse(source)?,
                target: VariantKey::parse(target)?,
            });
        }
        for entry in &self.del_configs {
            let (target, parents) =
                entry
                    .split_first()
                    .ok_or(ConstructionError::EntryShape {
                        expected: "a target with optional parents",
                        got: 0,
                    })?;
            ops.del_configs.push(DelConfig {
                target: VariantKey::parse(target)?,
                parents: parents
                    .iter()
                    .map(|p| VariantKey::parse(p))
                    .collect::<Result<_, _>>()?,
            });
        }
        for (target, new_name) in &self.rep_configs {
            ops.rep_configs.push(RepConfig {
                target: VariantKey::parse(target)?,
                new_name: ConfigName::new(new_name)?,
            });
        }
        for entry in &self.add_libtypes {
            let (source, scope) = match entry.as_slice() {
                [source] => (source, None),
                [source, scope] => (source, Some(ConfigName::new(scope)?)),
                other => {
                    return Err(ConstructionError::EntryShape {
                        expected: "a source with an optional config scope",
                        got: other.len(),
                    })
                }
            };
            ops.add_libtypes.push(AddLibtype {
                source: LibraryKey::parse(source)?,
                scope,
            });
        }
        for target in &self.del_libtypes {
            ops.del_libtypes.push(DelLibtype {
                target: LibtypeKey::parse(target)?,
            });
        }
        for (target, new_name) in &self.rep_libtypes {
            ops.rep_libtypes.push(RepLibtype {
                target: LibtypeKey::parse(target)?,
                new_name: LibraryName::new(new_name)?,
            });
        }
        ops.include_libtypes = self
            .include_libtypes
            .iter()
            .map(|l| Libtype::new(l))
            .collect::<Result<_, _>>()?;
        ops.exclude_libtypes = self
            .exclude_libtypes
            .iter()
            .map(|l| Libtype::new(l))
            .collect::<Result<_, _>>()?;

        let mode = match (self.inplace, &self.new_config) {
            (true, Some(_)) => return Err(ConstructionError::ModeConflict),
            (false, None) => return Err(ConstructionError::ModeMissing),
            (true, None) => EditMode::InPlace,
            (false, Some(name)) => EditMode::NewConfig(ConfigName::new(name)?),
        };
        if ops.is_empty() {
            return Err(ConstructionError::NoOperations);
        }

        match &mode {
            EditMode::InPlace => {
                if root.config.is_reserved() {
                    return Err(ConstructionError::ReservedInPlace(root.config.clone()));
                }
            }
            EditMode::NewConfig(name) => {
                if name.is_reserved() {
                    return Err(ConstructionError::ReservedNewName(name.clone()));
                }
                if name.is_immutable() {
                    return Err(ConstructionError::ImmutableNewName(name.clone()));
                }
            }
        }

        Ok(EditPlan {
            root,
            mode,
            ops,
            preview: self.preview,
        })
    }
}

impl EditPlan {
    /// Run validation steps 4 and 5 against a repository.
    pub fn check(&self, repo: &dyn Repository) -> Result<(), ConstructionError> {
        if !repo.project_exists(&self.root.project)? {
            return Err(ConstructionError::Missing {
                name: self.root.project.to_string(),
                expected: "project",
            });
        }
        let root_location = VariantKey::new(self.root.project.clone(), self.root.variant.clone());
        if !repo.variant_exists(&root_location.project, &root_location.variant)? {
            return Err(ConstructionError::Missing {
                name: root_location.to_string(),
                expected: "project/variant",
            });
        }

        for op in &self.ops.add_configs {
            let key = &op.source;
            if !repo.config_exists(&key.project, &key.variant, &key.config)? {
                return Err(ConstructionError::Missing {
                    name: key.to_string(),
                    expected: "project/variant@config",
                });
            }
            if !repo.variant_exists(&op.target.project, &op.target.variant)? {
                return Err(ConstructionError::Missing {
                    name: op.target.to_string(),
                    expected: "project/variant",
                });
            }
        }
        for op in &self.ops.del_configs {
            for location in std::iter::once(&op.target).chain(op.parents.iter()) {
                if !repo.variant_exists(&location.project, &location.variant)? {
                    return Err(ConstructionError::Missing {
                        name: location.to_string(),
                        expected: "project/variant",
                    });
                }
            }
        }
        for op in &self.ops.rep_configs {
            if !repo.config_exists(&op.target.project, &op.target.variant, &op.new_name)? {
                return Err(ConstructionError::Missing {
                    name: format!("{}@{}", op.target, op.new_name),
                    expected: "project/variant@config",
                });
            }
        }
        for op in &self.ops.add_libtypes {
            if !library_or_release_exists(repo, &op.source)? {
                return Err(ConstructionError::Missing {
                    name: op.source.to_string(),
                    expected: "project/variant:libtype@library",
                });
            }
        }
        for op in &self.ops.del_libtypes {
            let key = &op.target;
            if !repo.libtype_exists(&key.project, &key.variant, &key.libtype)? {
                return Err(ConstructionError::Missing {
                    name: key.to_string(),
                    expected: "project/variant:libtype",
                });
            }
        }
        for op in &self.ops.rep_libtypes {
            let replacement = LibraryKey::new(
                op.target.project.clone(),
                op.target.variant.clone(),
                op.target.libtype.clone(),
                op.new_name.clone(),
            );
            if !library_or_release_exists(repo, &replacement)? {
                return Err(ConstructionError::Missing {
                    name: replacement.to_string(),
                    expected: "project/variant:libtype@library",
                });
            }
        }

        if self.mode == EditMode::InPlace && self.root.config.is_immutable() {
            return Err(ConstructionError::ImmutableRoot(self.root.clone()));
        }

        Ok(())
    }
}

fn library_or_release_exists(
    repo: &dyn Repository,
    key: &LibraryKey,
) -> Result<bool, RepoError> {
    Ok(
        repo.library_exists(&key.project, &key.variant, &key.libtype, &key.library)?
            || repo.release_exists(&key.project, &key.variant, &key.libtype, &key.library)?,
    )
}
