// src/lock.rs

//! Single-instance advisory lock.
//!
//! Two monitors watching the same filesystem would scan everything twice, so
//! startup takes an exclusive, non-blocking `flock` on a well-known file and
//! holds it for the life of the process. The lock is released when the
//! [`InstanceLock`] is dropped (or the process dies).

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{Result, SigwatchError};

#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    _file: File,
}

impl InstanceLock {
    /// Create (if needed) and lock `path`.
    ///
    /// Fails with [`SigwatchError::LockHeld`] if another process (or another
    /// `InstanceLock` in this process) already holds it.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        match try_lock_exclusive(&file) {
            Ok(()) => {
                debug!(path = ?path, "acquired instance lock");
                Ok(Self {
                    path: path.to_path_buf(),
                    _file: file,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                Err(SigwatchError::LockHeld(path.to_path_buf()))
            }
            Err(e) => Err(SigwatchError::IoError(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and valid for this call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

// Advisory locking is only implemented on unix; elsewhere the lock file is
// created but not locked.
#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}
