//! engine
//!
//! Executes a validated edit plan against a loaded BOM tree.
//!
//! # Architecture
//!
//! [`EditSession`] is the coordinator. It owns the loaded tree, the
//! modified set, and the recoverable-failure log for exactly one run:
//!
//! 1. **Load**: fetch the root's tree from the repository
//! 2. **Configs**: delete → add → replace composite configs
//! 3. **Libtypes**: delete → add → replace library leaves
//! 4. **Filters**: drop leaves by exclude/include libtype lists
//! 5. **Prune**: remove composites left with no children
//! 6. **Finalize**: re-identify every modified immutable config
//! 7. **Validate**: run the repository's structural validator
//! 8. **Publish**: persist the result unless previewing or degraded
//!
//! Mutation passes record which immutable composites changed; the
//! bookkeeping lives in [`mutate::ModifiedSet`] and is consumed by
//! [`finalize`]. Nothing here talks to storage except through the
//! [`Repository`](crate::repo::Repository) trait.
//!
//! # Invariants
//!
//! - Fatal errors abort the run before publish; recoverable failures are
//!   aggregated and the remaining operations still execute
//! - Mutable composites are never renamed and never enter the modified set
//! - The tree is published only when validation passes, no operation
//!   failed, and the session is not a preview

pub mod finalize;
pub mod mutate;
pub mod session;

pub use mutate::ModifiedSet;
pub use session::{EditSession, RunReport, SessionId};

use thiserror::Error;

use crate::core::types::ConfigKey;
use crate::ops::ConstructionError;
use crate::repo::RepoError;

fn join_keys(keys: &[ConfigKey]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from running an edit session.
///
/// Construction problems, missing identities, naming collisions, and
/// validation findings are fatal. `Degraded` is the aggregate of
/// recoverable failures: the run finished, but some operations reported
/// problems and the tree was not published.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error("{name} does not exist in the {tree} configuration tree")]
    NotFound { name: String, tree: String },

    #[error(
        "cannot change the children of an immutable configuration in place; \
         a new configuration name is required"
    )]
    ImmutableInPlace,

    #[error("naming collision: {} already present in the store", join_keys(.0))]
    NamingCollision(Vec<ConfigKey>),

    #[error("{} of the requested edits failed", .failures.len())]
    Degraded { failures: Vec<String> },

    #[error("problems detected while validating the edited configuration tree")]
    Validation { messages: Vec<String> },

    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_missing_identity() {
        let err = EditError::NotFound {
            name: "p/gone".to_string(),
            tree: "p/root@REL1.0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "p/gone does not exist in the p/root@REL1.0 configuration tree"
        );
    }

    #[test]
    fn display_lists_every_collision() {
        let collisions = vec![
            ConfigKey::parse("p/top@fixup").unwrap(),
            ConfigKey::parse("p/sub@fixup").unwrap(),
        ];
        assert_eq!(
            EditError::NamingCollision(collisions).to_string(),
            "naming collision: p/top@fixup, p/sub@fixup already present in the store"
        );
    }

    #[test]
    fn display_counts_degraded_failures() {
        let err = EditError::Degraded {
            failures: vec!["one".to_string(), "two".to_string(), "three".to_string()],
        };
        assert_eq!(err.to_string(), "3 of the requested edits failed");
    }

    #[test]
    fn construction_errors_pass_through() {
        let err = EditError::from(ConstructionError::ModeMissing);
        assert_eq!(
            err.to_string(),
            "one of inplace or a new configuration name must be chosen"
        );
    }
}
