//! # File Lock
//!
//! Exclusive advisory `flock` on a lock file. Every process and every open
//! of the same path contends for it; the lock is released when the guard
//! is dropped and its descriptor closed.

use std::fs::{self, File, OpenOptions};
use std::io;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use super::errors::{PersistenceError, PersistenceResult};

/// Held lock on `path`
#[derive(Debug)]
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until the lock is held, creating the lock file if needed
    pub fn acquire(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PersistenceError::Io(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| PersistenceError::Io(format!("failed to open {}: {}", path.display(), e)))?;
        acquire_exclusive_blocking(&file)
            .map_err(|e| PersistenceError::Io(format!("failed to lock {}: {}", path.display(), e)))?;

        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn acquire_exclusive_blocking(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();
    loop {
        // SAFETY: `fd` belongs to `file`, which outlives this call. LOCK_EX
        // is a valid flock operation.
        let rc = unsafe { libc::flock(fd, libc::LOCK_EX) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn acquire_exclusive_blocking(_: &File) -> io::Result<()> {
    Ok(())
}
