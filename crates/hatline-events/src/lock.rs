//! Cross-process exclusivity lock over the GPIO subsystem.
//!
//! The lock is an exclusive non-blocking `flock(2)` on a well-known path. The
//! claim belongs to the open file description, so the kernel drops it as
//! soon as the holding process closes the descriptor, including on crash or
//! `SIGKILL`. The file's contents are never read or written.
//!
//! Within one process the lock is re-entrant through a single [`ProcessLock`]
//! value: acquiring it again while held reports
//! [`Acquired::AlreadyHeldByThisProcess`]. Two separate `ProcessLock` values
//! on the same path conflict exactly like two processes would.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Lock {} is held by another process", .path.display())]
    HeldElsewhere { path: PathBuf },

    #[error("Cannot open lock {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<LockError> for hatline_core::Error {
    fn from(e: LockError) -> Self {
        match e {
            LockError::HeldElsewhere { path } => Self::LibraryHeldElsewhere { path },
            LockError::Io { path, source } => Self::LockUnavailable { path, source },
        }
    }
}

/// Successful outcome of [`ProcessLock::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    Fresh,
    AlreadyHeldByThisProcess,
}

#[derive(Debug)]
pub struct ProcessLock {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ProcessLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.file.lock().is_some()
    }

    /// Take the lock without blocking.
    ///
    /// # Errors
    /// - `LockError::HeldElsewhere` if another descriptor holds the lock.
    /// - `LockError::Io` if the path cannot be opened or locked.
    pub fn acquire(&self) -> Result<Acquired, LockError> {
        let mut held = self.file.lock();
        if held.is_some() {
            debug!("Lock {} already held by this process", self.path.display());
            return Ok(Acquired::AlreadyHeldByThisProcess);
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(&self.path)
            .map_err(|source| LockError::Io {
                path: self.path.clone(),
                source,
            })?;

        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let source = io::Error::last_os_error();
            return Err(if source.kind() == io::ErrorKind::WouldBlock {
                LockError::HeldElsewhere {
                    path: self.path.clone(),
                }
            } else {
                LockError::Io {
                    path: self.path.clone(),
                    source,
                }
            });
        }

        info!("Acquired lock {}", self.path.display());
        *held = Some(file);
        Ok(Acquired::Fresh)
    }

    /// Drop the lock if held. Closing the descriptor releases it even if the
    /// explicit unlock fails.
    pub fn release(&self) {
        let Some(file) = self.file.lock().take() else {
            return;
        };

        // SAFETY: as in `acquire`.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
        if rc != 0 {
            warn!(
                "Unlocking {} failed: {}",
                self.path.display(),
                io::Error::last_os_error()
            );
        }
        drop(file);
        info!("Released lock {}", self.path.display());
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        self.release();
    }
}
