//! Launcher singleton lock.
//!
//! A single named boolean persisted outside any one window's memory. The
//! launcher sets it when it activates and clears it on graceful teardown.
//! Nothing records who holds it or since when, so a launcher that crashes
//! leaves the flag set until someone clears it by hand
//! (`vera-launcher clear-lock`).

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

/// Name of the persisted flag.
pub const LOCK_KEY: &str = "vera-launcher-active";

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Lock storage error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Storage for the launcher flag.
pub trait LockStore: Send + Sync {
    /// Whether the flag is currently set.
    fn is_held(&self) -> Result<bool, LockError>;

    /// Set the flag if it is clear. Returns false when it was already set.
    fn try_acquire(&self) -> Result<bool, LockError>;

    /// Clear the flag. Clearing an already clear flag is not an error.
    fn release(&self) -> Result<(), LockError>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// Flag held in memory. Shared between participants of one process.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    held: AtomicBool,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockStore for MemoryLockStore {
    fn is_held(&self) -> Result<bool, LockError> {
        Ok(self.held.load(Ordering::SeqCst))
    }

    fn try_acquire(&self) -> Result<bool, LockError> {
        Ok(self
            .held
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok())
    }

    fn release(&self) -> Result<(), LockError> {
        self.held.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// File-backed store
// ============================================================================

/// Flag persisted as a marker file: `{dir}/vera-launcher-active.lock`.
///
/// The file is created with `create_new`, so checking and setting the flag
/// is a single atomic step even across processes.
#[derive(Debug, Clone)]
pub struct FileLockStore {
    path: PathBuf,
}

impl FileLockStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{LOCK_KEY}.lock")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> LockError {
        LockError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl LockStore for FileLockStore {
    fn is_held(&self) -> Result<bool, LockError> {
        match fs::metadata(&self.path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn try_acquire(&self) -> Result<bool, LockError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                writeln!(file, "true").map_err(|e| self.io_error(e))?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn release(&self) -> Result<(), LockError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}
