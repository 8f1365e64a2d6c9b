//! repo::lock
//!
//! Exclusive lock on a file store.
//!
//! # Architecture
//!
//! Two processes writing the same store file would silently lose each
//! other's updates, so every store read-modify-write cycle happens under an
//! OS-level exclusive lock on `<store>/store.lock`. The engine itself does
//! nothing about cross-session concurrency; this lock is the store's own
//! single-writer guarantee.
//!
//! # Invariants
//!
//! - The lock is held for a whole load or publish, never across a session
//! - The lock is released automatically on drop (RAII)
//! - Acquisition is non-blocking: a held lock fails fast with
//!   [`LockError::AlreadyLocked`]

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// File name of the lock inside the store directory.
const LOCK_FILE: &str = "store.lock";

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("store is locked by another espalier process")]
    AlreadyLocked,

    /// Failed to create the lock file or the store directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),

    /// I/O error during lock operations.
    #[error("lock i/o error: {0}")]
    IoError(#[from] std::io::Error),
}

/// An exclusive lock on a store directory.
///
/// The lock is released when this guard is dropped, so it stays released
/// even when the holder unwinds.
#[derive(Debug)]
pub struct StoreLock {
    /// Path to the lock file.
    path: PathBuf,
    /// The open file handle with the lock held.
    /// When this is Some, we hold the lock.
    file: Option<File>,
}

impl StoreLock {
    /// Attempt to acquire the lock for a store directory.
    ///
    /// Creates the directory when it does not exist yet. Acquisition uses
    /// OS-level file locking via `fs2`, which works across processes and
    /// does not block: a lock held elsewhere returns
    /// [`LockError::AlreadyLocked`] immediately.
    pub fn acquire(store_dir: &Path) -> Result<Self, LockError> {
        fs::create_dir_all(store_dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", store_dir.display(), e))
        })?;

        let path = store_dir.join(LOCK_FILE);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Try to acquire the lock, returning `None` when it is already held.
    pub fn try_acquire(store_dir: &Path) -> Result<Option<Self>, LockError> {
        match Self::acquire(store_dir) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check whether this guard still holds the lock.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock before the guard goes out of scope.
    ///
    /// Calling this more than once is harmless.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // Best-effort release; errors have nowhere to go during drop.
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
