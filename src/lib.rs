//! Espalier - a CLI for editing IP configuration BOM trees
//!
//! Espalier loads a released or in-development configuration tree from a
//! store, applies a batch of structural edits (add, delete, replace
//! configs and library leaves; include/exclude libtype filters), and
//! saves the result, re-identifying every immutable configuration whose
//! content changed.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to handlers)
//! - [`ops`] - Edit requests and their construction-time validation
//! - [`engine`] - Runs a validated plan: mutate, prune, finalize, publish
//! - [`core`] - Identity types, tree nodes, and tree traversal
//! - [`repo`] - Store abstraction with file-backed and mock implementations
//! - [`ui`] - Output formatting and tree reports
//!
//! # Correctness Invariants
//!
//! Espalier maintains the following invariants:
//!
//! 1. Immutable configurations are never modified in place; edits under
//!    them produce renamed copies along every affected path
//! 2. A request is validated in full before any tree is loaded
//! 3. Shared subtrees stay shared through every edit
//! 4. Nothing is published when validation or any edit failed

pub mod cli;
pub mod core;
pub mod engine;
pub mod ops;
pub mod repo;
pub mod ui;
