//! repo::file
//!
//! File-backed repository: a single JSON document per store directory.
//!
//! # Architecture
//!
//! The store keeps two kinds of records. `libraries` declares every known
//! library stream and release per libtype. `configs` holds one record per
//! composite identity, with children referenced by full name, so shared
//! subconfigs are stored once and rebuilt as shared nodes on load.
//!
//! Publishing upserts records by identity. A session that renamed
//! immutable configs therefore adds new records and leaves the old
//! identities' records untouched, which is exactly the copy-on-write
//! contract consumers rely on.
//!
//! # Storage
//!
//! - `<store>/store.json` - the document, written atomically via rename
//! - `<store>/store.lock` - OS-level lock held across read-modify-write
//!
//! # Invariants
//!
//! - Records are keyed by full name; an identity is never written twice
//! - Config references must resolve within the document and be acyclic

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::node::{ConfigNode, Node, NodeRef};
use crate::core::types::{
    ChangeRef, ConfigKey, ConfigName, Fingerprint, FullName, LibraryKey, LibraryName, Libtype,
    Project, Variant,
};
use crate::core::walk;

use super::lock::{LockError, StoreLock};
use super::traits::{RepoError, Repository};

/// File name of the document inside the store directory.
const STORE_FILE: &str = "store.json";

/// Current document format version.
const STORE_VERSION: u32 = 1;

/// Errors internal to the file store.
///
/// These map into [`RepoError`] at the trait boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("store not initialized at {0}")]
    NotInitialized(String),

    #[error("unsupported store version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("config reference cycle involving {0}")]
    Cycle(String),

    #[error("{0}")]
    Missing(String),
}

impl From<StoreError> for RepoError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing(name) => RepoError::NotFound(name),
            StoreError::Parse(e) => RepoError::Invalid(e.to_string()),
            StoreError::Cycle(name) => {
                RepoError::Invalid(format!("config reference cycle involving {name}"))
            }
            StoreError::UnsupportedVersion { found, expected } => RepoError::Invalid(format!(
                "unsupported store version {found} (expected {expected})"
            )),
            StoreError::Io(e) => RepoError::Unavailable(e.to_string()),
            StoreError::Lock(e) => RepoError::Unavailable(e.to_string()),
            StoreError::NotInitialized(path) => {
                RepoError::Unavailable(format!("store not initialized at {path}"))
            }
        }
    }
}

/// A declared library stream or release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryRecord {
    pub name: LibraryKey,
    /// True for frozen releases, false for mutable streams.
    #[serde(default)]
    pub release: bool,
}

/// One child slot of a stored config, referenced by full name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", deny_unknown_fields)]
pub enum ChildRecord {
    Config {
        name: ConfigKey,
    },
    Library {
        name: LibraryKey,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        change_ref: Option<ChangeRef>,
    },
}

/// A stored composite config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigRecord {
    pub name: ConfigKey,
    #[serde(default)]
    pub children: Vec<ChildRecord>,
}

/// The whole store document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreDoc {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    /// Fingerprint of the most recently published tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    #[serde(default)]
    pub libraries: Vec<LibraryRecord>,
    #[serde(default)]
    pub configs: Vec<ConfigRecord>,
}

impl StoreDoc {
    fn empty() -> Self {
        Self {
            version: STORE_VERSION,
            generated_at: None,
            fingerprint: None,
            libraries: Vec::new(),
            configs: Vec::new(),
        }
    }

    fn config(&self, key: &ConfigKey) -> Option<&ConfigRecord> {
        self.configs.iter().find(|r| r.name == *key)
    }

    fn declares_library(&self, key: &LibraryKey) -> bool {
        self.libraries.iter().any(|r| r.name == *key)
    }
}

/// A repository stored as one JSON document under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn store_path(&self) -> PathBuf {
        self.dir.join(STORE_FILE)
    }

    /// Create an empty document when none exists yet.
    ///
    /// Returns true when a fresh document was written.
    pub fn init(&self) -> Result<bool, StoreError> {
        let _lock = StoreLock::acquire(&self.dir)?;
        if self.store_path().exists() {
            return Ok(false);
        }
        self.write_doc(&StoreDoc::empty())?;
        Ok(true)
    }

    /// Check whether the store has been initialized.
    pub fn exists(&self) -> bool {
        self.store_path().exists()
    }

    fn read_doc(&self) -> Result<StoreDoc, StoreError> {
        let path = self.store_path();
        if !path.exists() {
            return Err(StoreError::NotInitialized(self.dir.display().to_string()));
        }
        let data = fs::read_to_string(&path)?;
        let doc: StoreDoc = serde_json::from_str(&data)?;
        if doc.version != STORE_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: doc.version,
                expected: STORE_VERSION,
            });
        }
        Ok(doc)
    }

    /// Write the document to a sibling file, then rename into place so
    /// readers never observe a torn write.
    fn write_doc(&self, doc: &StoreDoc) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(doc)?;
        let tmp = self.dir.join(format!("{STORE_FILE}.tmp"));
        fs::write(&tmp, json.as_bytes())?;
        fs::rename(&tmp, self.store_path())?;
        Ok(())
    }

    /// Rebuild the node graph for a stored config, sharing subconfig nodes
    /// the way the document shares records.
    fn build_config(
        &self,
        doc: &StoreDoc,
        key: &ConfigKey,
        cache: &mut HashMap<ConfigKey, NodeRef>,
        building: &mut HashSet<ConfigKey>,
    ) -> Result<NodeRef, StoreError> {
        if let Some(node) = cache.get(key) {
            return Ok(Rc::clone(node));
        }
        if !building.insert(key.clone()) {
            return Err(StoreError::Cycle(key.to_string()));
        }
        let record = doc
            .config(key)
            .ok_or_else(|| StoreError::Missing(format!("{key} does not exist in the store")))?;

        let mut children = Vec::with_capacity(record.children.len());
        for child in &record.children {
            let child_node = match child {
                ChildRecord::Config { name } => self.build_config(doc, name, cache, building)?,
                ChildRecord::Library { name, change_ref } => Node::new_library(
                    name.project.clone(),
                    name.variant.clone(),
                    name.libtype.clone(),
                    name.library.clone(),
                    change_ref.clone(),
                ),
            };
            children.push(child_node);
        }

        let node = Rc::new(RefCell::new(Node::Config(ConfigNode {
            project: key.project.clone(),
            variant: key.variant.clone(),
            config: key.config.clone(),
            children,
        })));
        building.remove(key);
        cache.insert(key.clone(), Rc::clone(&node));
        Ok(node)
    }

    fn load_inner(
        &self,
        project: &Project,
        variant: &Variant,
        config: &ConfigName,
        libtype: Option<&Libtype>,
    ) -> Result<NodeRef, StoreError> {
        let doc = self.read_doc()?;
        let key = ConfigKey::new(project.clone(), variant.clone(), config.clone());

        match libtype {
            None => {
                let mut cache = HashMap::new();
                let mut building = HashSet::new();
                self.build_config(&doc, &key, &mut cache, &mut building)
            }
            Some(libtype) => {
                let record = doc.config(&key).ok_or_else(|| {
                    StoreError::Missing(format!("{key} does not exist in the store"))
                })?;
                record
                    .children
                    .iter()
                    .find_map(|child| match child {
                        ChildRecord::Library { name, change_ref } if name.libtype == *libtype => {
                            Some(Node::new_library(
                                name.project.clone(),
                                name.variant.clone(),
                                name.libtype.clone(),
                                name.library.clone(),
                                change_ref.clone(),
                            ))
                        }
                        _ => None,
                    })
                    .ok_or_else(|| {
                        StoreError::Missing(format!(
                            "{project}/{variant}:{libtype} is not in configuration {config}"
                        ))
                    })
            }
        }
    }

    fn resolve_library(&self, key: &LibraryKey) -> Result<NodeRef, StoreError> {
        let doc = self.read_doc()?;
        if !doc.declares_library(key) {
            return Err(StoreError::Missing(format!(
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

    fn publish_inner(&self, root: &NodeRef, modified: &[ConfigKey]) -> Result<(), StoreError> {
        let _lock = StoreLock::acquire(&self.dir)?;
        let mut doc = if self.store_path().exists() {
            self.read_doc()?
        } else {
            StoreDoc::empty()
        };

        let mut written = 0usize;
        for node in walk::flatten(root) {
            match &*node.borrow() {
                Node::Library(lib) => {
                    let key = lib.key();
                    if !doc.declares_library(&key) {
                        let release = key.library.is_immutable();
                        doc.libraries.push(LibraryRecord { name: key, release });
                    }
                }
                Node::Config(cfg) => {
                    let record = ConfigRecord {
                        name: cfg.key(),
                        children: cfg
                            .children
                            .iter()
                            .map(|child| match &*child.borrow() {
                                Node::Config(sub) => ChildRecord::Config { name: sub.key() },
                                Node::Library(lib) => ChildRecord::Library {
                                    name: lib.key(),
                                    change_ref: lib.change_ref.clone(),
                                },
                            })
                            .collect(),
                    };
                    match doc.configs.iter_mut().find(|r| r.name == record.name) {
                        Some(existing) => *existing = record,
                        None => doc.configs.push(record),
                    }
                    written += 1;
                }
            }
        }

        doc.generated_at = Some(Utc::now());
        doc.fingerprint = Some(walk::fingerprint(root));
        self.write_doc(&doc)?;

        debug!(
            "published {} under {} ({written} config records, {} renamed)",
            root.borrow().full_name(),
            self.dir.display(),
            modified.len()
        );
        Ok(())
    }
}

impl Repository for FileStore {
    fn load(
        &self,
        project: &Project,
        variant: &Variant,
        config: &ConfigName,
        libtype: Option<&Libtype>,
    ) -> Result<NodeRef, RepoError> {
        Ok(self.load_inner(project, variant, config, libtype)?)
    }

    fn resolve_full_name(&self, name: &FullName) -> Result<NodeRef, RepoError> {
        match name {
            FullName::Config(key) => self.load(&key.project, &key.variant, &key.config, None),
            FullName::Library(key) => Ok(self.resolve_library(key)?),
        }
    }

    fn project_exists(&self, project: &Project) -> Result<bool, RepoError> {
        let doc = self.read_doc()?;
        Ok(doc.configs.iter().any(|r| r.name.project == *project)
            || doc.libraries.iter().any(|r| r.name.project == *project))
    }

    fn variant_exists(&self, project: &Project, variant: &Variant) -> Result<bool, RepoError> {
        let doc = self.read_doc()?;
        Ok(doc
            .configs
            .iter()
            .any(|r| r.name.project == *project && r.name.variant == *variant)
            || doc
                .libraries
                .iter()
                .any(|r| r.name.project == *project && r.name.variant == *variant))
    }

    fn libtype_exists(
        &self,
        project: &Project,
        variant: &Variant,
        libtype: &Libtype,
    ) -> Result<bool, RepoError> {
        let doc = self.read_doc()?;
        Ok(doc.libraries.iter().any(|r| {
            r.name.project == *project && r.name.variant == *variant && r.name.libtype == *libtype
        }))
    }

    fn config_exists(
        &self,
        project: &Project,
        variant: &Variant,
        config: &ConfigName,
    ) -> Result<bool, RepoError> {
        let doc = self.read_doc()?;
        let key = ConfigKey::new(project.clone(), variant.clone(), config.clone());
        Ok(doc.config(&key).is_some())
    }

    fn library_exists(
        &self,
        project: &Project,
        variant: &Variant,
        libtype: &Libtype,
        library: &LibraryName,
    ) -> Result<bool, RepoError> {
        let doc = self.read_doc()?;
        let key = LibraryKey::new(
            project.clone(),
            variant.clone(),
            libtype.clone(),
            library.clone(),
        );
        Ok(doc
            .libraries
            .iter()
            .any(|r| r.name == key && !r.release))
    }

    fn release_exists(
        &self,
        project: &Project,
        variant: &Variant,
        libtype: &Libtype,
        release: &LibraryName,
    ) -> Result<bool, RepoError> {
        let doc = self.read_doc()?;
        let key = LibraryKey::new(
            project.clone(),
            variant.clone(),
            libtype.clone(),
            release.clone(),
        );
        Ok(doc.libraries.iter().any(|r| r.name == key && r.release))
    }

    fn validate(&self, root: &NodeRef) -> Result<Vec<String>, RepoError> {
        let doc = self.read_doc()?;
        let mut messages = Vec::new();
        let nodes = walk::flatten(root);

        for node in &nodes {
            match &*node.borrow() {
                Node::Library(lib) => {
                    let key = lib.key();
                    if !doc.declares_library(&key) {
                        messages.push(format!("{key} is not a defined library or release"));
                    }
                }
                Node::Config(cfg) => {
                    let known = doc.configs.iter().any(|r| {
                        r.name.project == cfg.project && r.name.variant == cfg.variant
                    }) || doc.libraries.iter().any(|r| {
                        r.name.project == cfg.project && r.name.variant == cfg.variant
                    });
                    if !known {
                        messages.push(format!(
                            "variant {} does not exist in project {}",
                            cfg.variant, cfg.project
                        ));
                    }
                    for child in &cfg.children {
                        let child = child.borrow();
                        if let Node::Library(lib) = &*child {
                            if lib.project != cfg.project || lib.variant != cfg.variant {
                                messages.push(format!(
                                    "{} is not local to {}",
                                    lib.key(),
                                    cfg.key()
                                ));
                            }
                        }
                        if cfg.config.is_immutable() && !child.is_immutable() {
                            messages.push(format!(
                                "{} is a mutable object within immutable configuration {}",
                                child.full_name(),
                                cfg.key()
                            ));
                        }
                    }
                }
            }
        }

        // Two different names for one location in the same tree is a clash.
        // Composites group by project/variant, leaves by
        // project/variant:libtype.
        let mut by_location: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for node in &nodes {
            let node = node.borrow();
            let location = match &*node {
                Node::Config(_) => node.location().to_string(),
                Node::Library(lib) => lib.location().to_string(),
            };
            by_location
                .entry(location)
                .or_default()
                .insert(node.full_name());
        }
        for (location, names) in by_location {
            if names.len() > 1 {
                let names: Vec<String> = names.into_iter().collect();
                messages.push(format!(
                    "multiple configurations for {location} found: {}",
                    names.join(", ")
                ));
            }
        }

        Ok(messages)
    }

    fn publish(&self, root: &NodeRef, modified: &[ConfigKey]) -> Result<(), RepoError> {
        Ok(self.publish_inner(root, modified)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let temp = TempDir::new().expect("create temp dir");
        let store = FileStore::new(temp.path());
        store.init().expect("init store");
        (temp, store)
    }

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

    /// root -> [shared, mid -> shared], shared carries an rtl leaf.
    fn publish_diamond(store: &FileStore) {
        let root = config("p", "top", "dev");
        let mid = config("p", "mid", "dev");
        let shared = config("p", "shared", "dev");
        link(&shared, &library("p", "shared", "rtl", "dev"));
        link(&root, &shared);
        link(&root, &mid);
        link(&mid, &shared);
        store.publish(&root, &[]).expect("publish");
    }

    mod lifecycle {
        use super::*;

        #[test]
        fn init_is_idempotent() {
            let temp = TempDir::new().expect("create temp dir");
            let store = FileStore::new(temp.path());
            assert!(!store.exists());
            assert!(store.init().expect("first init"));
            assert!(store.exists());
            assert!(!store.init().expect("second init"));
        }

        #[test]
        fn load_requires_initialized_store() {
            let temp = TempDir::new().expect("create temp dir");
            let store = FileStore::new(temp.path().join("missing"));
            let err = store
                .load(
                    &Project::new("p").unwrap(),
                    &Variant::new("v").unwrap(),
                    &ConfigName::new("dev").unwrap(),
                    None,
                )
                .unwrap_err();
            assert!(matches!(err, RepoError::Unavailable(_)));
        }

        #[test]
        fn version_mismatch_is_invalid() {
            let (temp, store) = store();
            fs::write(
                temp.path().join(STORE_FILE),
                r#"{"version": 99, "libraries": [], "configs": []}"#,
            )
            .unwrap();
            let err = store
                .project_exists(&Project::new("p").unwrap())
                .unwrap_err();
            assert!(matches!(err, RepoError::Invalid(_)));
            assert!(err.to_string().contains("version 99"));
        }
    }

    mod loading {
        use super::*;

        #[test]
        fn roundtrip_preserves_sharing() {
            let (_temp, store) = store();
            publish_diamond(&store);

            let root = store
                .load(
                    &Project::new("p").unwrap(),
                    &Variant::new("top").unwrap(),
                    &ConfigName::new("dev").unwrap(),
                    None,
                )
                .expect("load");

            let root_ref = root.borrow();
            let children = &root_ref.as_config().unwrap().children;
            assert_eq!(children.len(), 2);

            let shared_direct = Rc::clone(&children[0]);
            let mid = Rc::clone(&children[1]);
            let mid_ref = mid.borrow();
            let shared_via_mid = Rc::clone(&mid_ref.as_config().unwrap().children[0]);

            // Both routes land on the same node object.
            assert!(Rc::ptr_eq(&shared_direct, &shared_via_mid));
            assert_eq!(walk::flatten(&root).len(), 4);
        }

        #[test]
        fn roundtrip_preserves_child_order() {
            let (_temp, store) = store();
            let root = config("p", "top", "dev");
            link(&root, &library("p", "top", "rtl", "dev"));
            link(&root, &library("p", "top", "oa", "dev"));
            store.publish(&root, &[]).expect("publish");

            let loaded = store
                .load(
                    &Project::new("p").unwrap(),
                    &Variant::new("top").unwrap(),
                    &ConfigName::new("dev").unwrap(),
                    None,
                )
                .expect("load");
            let loaded = loaded.borrow();
            let names: Vec<String> = loaded
                .as_config()
                .unwrap()
                .children
                .iter()
                .map(|c| c.borrow().full_name())
                .collect();
            assert_eq!(names, vec!["p/top:rtl@dev", "p/top:oa@dev"]);
        }

        #[test]
        fn unknown_config_is_not_found() {
            let (_temp, store) = store();
            let err = store
                .load(
                    &Project::new("p").unwrap(),
                    &Variant::new("ghost").unwrap(),
                    &ConfigName::new("dev").unwrap(),
                    None,
                )
                .unwrap_err();
            assert_eq!(
                err,
                RepoError::NotFound("p/ghost@dev does not exist in the store".into())
            );
        }

        #[test]
        fn libtype_load_returns_pinned_leaf() {
            let (_temp, store) = store();
            publish_diamond(&store);

            let leaf = store
                .load(
                    &Project::new("p").unwrap(),
                    &Variant::new("shared").unwrap(),
                    &ConfigName::new("dev").unwrap(),
                    Some(&Libtype::new("rtl").unwrap()),
                )
                .expect("load leaf");
            assert_eq!(leaf.borrow().full_name(), "p/shared:rtl@dev");
        }

        #[test]
        fn libtype_load_fails_when_config_lacks_it() {
            let (_temp, store) = store();
            publish_diamond(&store);

            let err = store
                .load(
                    &Project::new("p").unwrap(),
                    &Variant::new("shared").unwrap(),
                    &ConfigName::new("dev").unwrap(),
                    Some(&Libtype::new("oa").unwrap()),
                )
                .unwrap_err();
            assert!(err.to_string().contains("p/shared:oa"));
        }

        #[test]
        fn cycles_are_rejected() {
            let (temp, store) = store();
            let doc = r#"{
                "version": 1,
                "libraries": [],
                "configs": [
                    {"name": "p/a@dev", "children": [{"kind": "config", "name": "p/b@dev"}]},
                    {"name": "p/b@dev", "children": [{"kind": "config", "name": "p/a@dev"}]}
                ]
            }"#;
            fs::write(temp.path().join(STORE_FILE), doc).unwrap();

            let err = store
                .load(
                    &Project::new("p").unwrap(),
                    &Variant::new("a").unwrap(),
                    &ConfigName::new("dev").unwrap(),
                    None,
                )
                .unwrap_err();
            assert!(matches!(err, RepoError::Invalid(_)));
            assert!(err.to_string().contains("cycle"));
        }
    }

    mod resolving {
        use super::*;

        #[test]
        fn full_name_resolves_config_subtree() {
            let (_temp, store) = store();
            publish_diamond(&store);

            let name = FullName::parse("p/mid@dev").unwrap();
            let node = store.resolve_full_name(&name).expect("resolve");
            assert_eq!(node.borrow().full_name(), "p/mid@dev");
            assert_eq!(walk::flatten(&node).len(), 3);
        }

        #[test]
        fn full_name_resolves_declared_library() {
            let (_temp, store) = store();
            publish_diamond(&store);

            let name = FullName::parse("p/shared:rtl@dev").unwrap();
            let node = store.resolve_full_name(&name).expect("resolve");
            assert!(node.borrow().is_library());
        }

        #[test]
        fn undeclared_library_is_not_found() {
            let (_temp, store) = store();
            publish_diamond(&store);

            let name = FullName::parse("p/shared:oa@dev").unwrap();
            let err = store.resolve_full_name(&name).unwrap_err();
            assert!(matches!(err, RepoError::NotFound(_)));
        }
    }

    mod publishing {
        use super::*;

        #[test]
        fn publish_declares_leaf_libraries() {
            let (_temp, store) = store();
            let root = config("p", "top", "dev");
            link(&root, &library("p", "top", "rtl", "dev"));
            link(&root, &library("p", "top", "oa", "REL1.0"));
            store.publish(&root, &[]).expect("publish");

            let p = Project::new("p").unwrap();
            let v = Variant::new("top").unwrap();
            assert!(store
                .library_exists(
                    &p,
                    &v,
                    &Libtype::new("rtl").unwrap(),
                    &LibraryName::new("dev").unwrap()
                )
                .unwrap());
            // Immutable leaf names are recorded as releases.
            assert!(store
                .release_exists(
                    &p,
                    &v,
                    &Libtype::new("oa").unwrap(),
                    &LibraryName::new("REL1.0").unwrap()
                )
                .unwrap());
            assert!(!store
                .library_exists(
                    &p,
                    &v,
                    &Libtype::new("oa").unwrap(),
                    &LibraryName::new("REL1.0").unwrap()
                )
                .unwrap());
        }

        #[test]
        fn publish_keeps_replaced_identities() {
            let (_temp, store) = store();
            let root = config("p", "top", "REL1.0");
            link(&root, &library("p", "top", "rtl", "dev"));
            store.publish(&root, &[]).expect("first publish");

            // A later session renamed the root and published again.
            root.borrow_mut().as_config_mut().unwrap().config =
                ConfigName::new("REL2.0").unwrap();
            let renamed = root.borrow().as_config().unwrap().key();
            store.publish(&root, &[renamed]).expect("second publish");

            let p = Project::new("p").unwrap();
            let v = Variant::new("top").unwrap();
            assert!(store
                .config_exists(&p, &v, &ConfigName::new("REL1.0").unwrap())
                .unwrap());
            assert!(store
                .config_exists(&p, &v, &ConfigName::new("REL2.0").unwrap())
                .unwrap());
        }

        #[test]
        fn publish_records_fingerprint_and_timestamp() {
            let (_temp, store) = store();
            publish_diamond(&store);

            let doc = store.read_doc().expect("read");
            assert!(doc.generated_at.is_some());
            let root = store
                .load(
                    &Project::new("p").unwrap(),
                    &Variant::new("top").unwrap(),
                    &ConfigName::new("dev").unwrap(),
                    None,
                )
                .unwrap();
            assert_eq!(doc.fingerprint, Some(walk::fingerprint(&root)));
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn published_tree_is_valid() {
            let (_temp, store) = store();
            publish_diamond(&store);
            let root = store
                .load(
                    &Project::new("p").unwrap(),
                    &Variant::new("top").unwrap(),
                    &ConfigName::new("dev").unwrap(),
                    None,
                )
                .unwrap();
            // The mid config has only a subconfig child, which is fine.
            let mid_ok = store.validate(&root).expect("validate");
            assert_eq!(mid_ok, Vec::<String>::new());
        }

        #[test]
        fn undeclared_leaf_is_flagged() {
            let (_temp, store) = store();
            publish_diamond(&store);

            let root = config("p", "top", "dev");
            link(&root, &library("p", "top", "timemod", "dev"));
            let messages = store.validate(&root).expect("validate");
            assert_eq!(
                messages,
                vec!["p/top:timemod@dev is not a defined library or release".to_string()]
            );
        }

        #[test]
        fn unknown_variant_is_flagged() {
            let (_temp, store) = store();
            let root = config("p", "ghost", "dev");
            let messages = store.validate(&root).expect("validate");
            assert_eq!(
                messages,
                vec!["variant ghost does not exist in project p".to_string()]
            );
        }

        #[test]
        fn non_local_leaf_is_flagged() {
            let (_temp, store) = store();
            publish_diamond(&store);

            // The shared rtl leaf is declared, but linking it under p/top
            // puts it outside its own variant.
            let root = config("p", "top", "dev");
            link(&root, &library("p", "shared", "rtl", "dev"));
            let messages = store.validate(&root).expect("validate");
            assert_eq!(
                messages,
                vec!["p/shared:rtl@dev is not local to p/top@dev".to_string()]
            );
        }

        #[test]
        fn mutable_child_of_immutable_config_is_flagged() {
            let (_temp, store) = store();
            let root = config("p", "top", "REL1.0");
            link(&root, &library("p", "top", "rtl", "dev"));
            store.publish(&root, &[]).expect("publish");

            let messages = store.validate(&root).expect("validate");
            assert_eq!(
                messages,
                vec![
                    "p/top:rtl@dev is a mutable object within immutable configuration p/top@REL1.0"
                        .to_string()
                ]
            );
        }

        #[test]
        fn clashing_configs_are_flagged() {
            let (_temp, store) = store();
            let root = config("p", "top", "dev");
            link(&root, &config("p", "sub", "REL1.0"));
            link(&root, &config("p", "sub", "REL2.0"));
            store.publish(&root, &[]).expect("publish");

            let messages = store.validate(&root).expect("validate");
            assert_eq!(
                messages,
                vec![
                    "multiple configurations for p/sub found: p/sub@REL1.0, p/sub@REL2.0"
                        .to_string()
                ]
            );
        }

        #[test]
        fn clashing_leaves_for_one_libtype_are_flagged() {
            let (_temp, store) = store();
            let root = config("p", "top", "dev");
            link(&root, &library("p", "top", "rtl", "dev"));
            link(&root, &library("p", "top", "rtl", "other"));
            store.publish(&root, &[]).expect("publish");

            let messages = store.validate(&root).expect("validate");
            assert_eq!(
                messages,
                vec![
                    "multiple configurations for p/top:rtl found: p/top:rtl@dev, p/top:rtl@other"
                        .to_string()
                ]
            );
        }
    }
}
