//! Advisory cross-process lock guarding profile mutation.

use crate::error::{GenvError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

pub const LOCK_FILE_NAME: &str = ".lock";

/// An exclusive lock on `<dir>/.lock`, released when dropped.
#[derive(Debug)]
pub struct ExclusiveLock {
    file: File,
    path: PathBuf,
}

impl ExclusiveLock {
    /// Blocks until the lock is available.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let (file, path) = open_lock_file(dir)?;
        tracing::debug!("Waiting for lock {}", path.display());
        file.lock_exclusive()
            .map_err(|e| GenvError::io(format!("Failed to lock {}", path.display()), e))?;
        tracing::debug!("Acquired lock {}", path.display());
        Ok(Self { file, path })
    }

    /// Fails with [`GenvError::LockContention`] instead of waiting.
    pub fn try_acquire(dir: &Path) -> Result<Self> {
        let (file, path) = open_lock_file(dir)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file, path }),
            Err(e) if is_contended(&e) => Err(GenvError::LockContention { path }),
            Err(e) => Err(GenvError::io(
                format!("Failed to lock {}", path.display()),
                e,
            )),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ExclusiveLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release lock {}: {}", self.path.display(), e);
        } else {
            tracing::debug!("Released lock {}", self.path.display());
        }
    }
}

fn open_lock_file(dir: &Path) -> Result<(File, PathBuf)> {
    fs::create_dir_all(dir)
        .map_err(|e| GenvError::io(format!("Failed to create {}", dir.display()), e))?;
    let path = dir.join(LOCK_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| GenvError::io(format!("Failed to open {}", path.display()), e))?;
    Ok((file, path))
}

fn is_contended(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Tracks whether one owner (a version manager) currently holds its lock.
///
/// The file lock alone cannot catch re-entrant use: a second open of the lock
/// file from the same process would simply block forever.
#[derive(Debug, Default)]
pub struct LockSlot {
    held: AtomicBool,
}

struct SlotReset<'a>(&'a AtomicBool);

impl Drop for SlotReset<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl LockSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    /// Runs `f` while holding the exclusive lock in `dir`. The lock is
    /// released on every exit path, including unwinding out of `f`.
    pub fn with_lock<T>(&self, tool: &str, dir: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if self.held.swap(true, Ordering::SeqCst) {
            return Err(GenvError::LockAlreadyHeld {
                tool: tool.to_string(),
            });
        }
        let _reset = SlotReset(&self.held);
        let _lock = ExclusiveLock::acquire(dir)?;
        f()
    }
}
