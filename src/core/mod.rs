//! core
//!
//! Core domain model for BOM trees.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Project, Variant, ConfigName, full-name keys
//! - [`node`] - The two-variant tree node and child surgery
//! - [`walk`] - Traversals: flatten, occurrence search, path closures, pruning
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid identities at construction time
//! - Shared nodes are addressed by pointer, matched by value
//! - Ancestry is recomputed from the root on demand, never cached

pub mod node;
pub mod types;
pub mod walk;
