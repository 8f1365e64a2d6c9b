//! repo
//!
//! Abstraction over the configuration store backing a session.
//!
//! # Architecture
//!
//! The `Repository` trait defines every interaction the edit engine has
//! with the outside world: loading trees, checking that referenced pieces
//! exist, validating a tree against declared libraries and publishing the
//! result. The engine never talks to storage directly, so the whole
//! mutation pipeline runs identically against the file-backed store and
//! the in-memory mock.
//!
//! Store access failures carry no tree state. A failed load aborts a
//! session before any mutation; failed validation or publishing is
//! reported against an already mutated in-memory tree that is simply
//! never written back.
//!
//! # Modules
//!
//! - `traits`: Core `Repository` trait and its error type
//! - [`file`]: JSON document store with OS-level locking
//! - [`mock`]: In-memory implementation for deterministic testing
//! - `lock`: Advisory lock guarding store writes

pub mod file;
pub mod lock;
pub mod mock;
mod traits;

pub use file::{FileStore, StoreError};
pub use lock::{LockError, StoreLock};
pub use mock::{FailOn, MockOperation, MockRepo};
pub use traits::*;
