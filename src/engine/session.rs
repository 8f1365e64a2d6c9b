//! engine::session
//!
//! One edit session: a validated plan, the tree it operates on and the
//! bookkeeping the run accumulates.
//!
//! # Architecture
//!
//! [`EditSession::new`] runs the full construction-time validation, so a
//! session that exists at all is structurally sound and every name it
//! references existed at check time. [`EditSession::run`] then drives the
//! pipeline over a tree loaded from the repository and either publishes
//! the result or reports why it could not.
//!
//! The session keeps the mutated tree alive after `run` returns, so a
//! caller can still render what the edits produced when the run failed.

use std::rc::Rc;

use tracing::{error, info};
use uuid::Uuid;

use crate::core::node::NodeRef;
use crate::core::types::ConfigKey;
use crate::ops::{ConstructionError, EditMode, EditPlan, EditRequest};
use crate::repo::Repository;

use super::{finalize, mutate, EditError, ModifiedSet};

/// Unique identifier for an edit session, carried in every log line the
/// session emits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new unique session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Identity of the edited tree's root after re-identification.
    pub root: ConfigKey,
    /// Former identities of every renamed composite, root last.
    pub renamed: Vec<ConfigKey>,
    /// Composites dropped for having no children left.
    pub pruned: Vec<ConfigKey>,
    /// Whether the tree was written back to the store.
    pub published: bool,
    /// Whether this was a preview run.
    pub preview: bool,
}

/// A single tree-edit session against one repository.
pub struct EditSession<'a> {
    repo: &'a dyn Repository,
    plan: EditPlan,
    id: SessionId,
    tree: Option<NodeRef>,
    modified: ModifiedSet,
    failures: Vec<String>,
}

impl<'a> EditSession<'a> {
    /// Validate `request` and build a session for it.
    ///
    /// Runs every construction-time check: request shape, mode and
    /// reserved-name rules first, then existence of each referenced piece
    /// against `repo`, then the in-place immutability rule.
    pub fn new(repo: &'a dyn Repository, request: &EditRequest) -> Result<Self, ConstructionError> {
        let plan = request.parse()?;
        plan.check(repo)?;
        Ok(Self {
            repo,
            plan,
            id: SessionId::new(),
            tree: None,
            modified: ModifiedSet::default(),
            failures: Vec::new(),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn plan(&self) -> &EditPlan {
        &self.plan
    }

    /// The tree the session operated on, once `run` has loaded it.
    ///
    /// Stays available after a failed run so the partially edited tree
    /// can still be rendered.
    pub fn tree(&self) -> Option<&NodeRef> {
        self.tree.as_ref()
    }

    /// Execute the edit pipeline.
    ///
    /// Operation families run in a fixed order: config edits, then
    /// libtype edits, then the leaf filters, each family applying deletes
    /// before adds before replacements. The tree is then pruned of empty
    /// composites, re-identified per the mode, validated and published.
    ///
    /// Recoverable per-edit failures accumulate and surface at the end as
    /// [`EditError::Degraded`]; the tree is never published when any edit
    /// failed or when the run is a preview.
    pub fn run(&mut self) -> Result<RunReport, EditError> {
        info!("session {} editing {}", self.id, self.plan.root);
        let root = self.repo.load(
            &self.plan.root.project,
            &self.plan.root.variant,
            &self.plan.root.config,
            None,
        )?;
        self.tree = Some(Rc::clone(&root));

        self.operate_on_configs(&root)?;
        self.operate_on_libtypes(&root)?;
        self.apply_filters(&root)?;

        let pruned = self.repo.remove_empty_configs(&root)?;
        for key in &pruned {
            info!("Removing empty configuration {key}");
        }

        let renamed = finalize::finalize(self.repo, &root, &self.plan.mode, &self.modified)?;

        let messages = self.repo.validate(&root)?;
        if !messages.is_empty() {
            for message in &messages {
                error!("{message}");
            }
            return Err(EditError::Validation { messages });
        }

        let published = if self.plan.preview {
            info!("Preview mode, not saving the edited tree");
            false
        } else if self.failures.is_empty() {
            match self.repo.publish(&root, &renamed) {
                Ok(()) => true,
                Err(err) => {
                    self.failures.push(err.to_string());
                    false
                }
            }
        } else {
            false
        };

        if !self.failures.is_empty() {
            return Err(EditError::Degraded {
                failures: std::mem::take(&mut self.failures),
            });
        }

        let root_key = match &self.plan.mode {
            EditMode::InPlace => self.plan.root.clone(),
            EditMode::NewConfig(name) => ConfigKey::new(
                self.plan.root.project.clone(),
                self.plan.root.variant.clone(),
                name.clone(),
            ),
        };
        Ok(RunReport {
            root: root_key,
            renamed,
            pruned,
            published,
            preview: self.plan.preview,
        })
    }

    fn operate_on_configs(&mut self, root: &NodeRef) -> Result<(), EditError> {
        if !self.plan.ops.del_configs.is_empty() {
            mutate::delete_configs(
                root,
                &self.plan.ops.del_configs,
                &mut self.modified,
                &mut self.failures,
            )?;
        }
        if !self.plan.ops.add_configs.is_empty() {
            mutate::add_configs(self.repo, root, &self.plan.ops.add_configs, &mut self.modified)?;
        }
        if !self.plan.ops.rep_configs.is_empty() {
            mutate::replace_configs(
                self.repo,
                root,
                &self.plan.ops.rep_configs,
                &mut self.modified,
                &mut self.failures,
            )?;
        }
        Ok(())
    }

    fn operate_on_libtypes(&mut self, root: &NodeRef) -> Result<(), EditError> {
        if !self.plan.ops.del_libtypes.is_empty() {
            mutate::delete_libtypes(
                root,
                &self.plan.ops.del_libtypes,
                &mut self.modified,
                &mut self.failures,
            )?;
        }
        if !self.plan.ops.add_libtypes.is_empty() {
            mutate::add_libtypes(
                self.repo,
                root,
                &self.plan.ops.add_libtypes,
                &mut self.modified,
            )?;
        }
        if !self.plan.ops.rep_libtypes.is_empty() {
            mutate::replace_libtypes(
                self.repo,
                root,
                &self.plan.ops.rep_libtypes,
                &mut self.modified,
                &mut self.failures,
            )?;
        }
        Ok(())
    }

    fn apply_filters(&mut self, root: &NodeRef) -> Result<(), EditError> {
        if !self.plan.ops.exclude_libtypes.is_empty() {
            mutate::exclude_libtypes(
                self.repo,
                root,
                &self.plan.ops.exclude_libtypes,
                &mut self.modified,
                &mut self.failures,
            )?;
        }
        if !self.plan.ops.include_libtypes.is_empty() {
            mutate::include_libtypes(
                self.repo,
                root,
                &self.plan.ops.include_libtypes,
                &mut self.modified,
                &mut self.failures,
            )?;
        }
        Ok(())
    }
}

/// The repository handle is elided from the output.
impl std::fmt::Debug for EditSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("id", &self.id)
            .field("plan", &self.plan)
            .field("tree", &self.tree)
            .field("modified", &self.modified)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}
