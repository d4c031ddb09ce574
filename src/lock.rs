//! Cross-process exclusive lock on an image archive.
//!
//! The lock is an advisory `flock(2)` on a sidecar `<archive>.lock` file.
//! The archive itself cannot carry the lock because rewriting it replaces
//! the file, and a lock held on the old inode would no longer exclude
//! anyone opening the new one.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use rustix::fs::{flock, FlockOperation};
use rustix::io::Errno;

use crate::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Held exclusive lock; released when dropped.
#[derive(Debug)]
pub struct ArchiveLock {
    path: PathBuf,
    file: File,
}

impl ArchiveLock {
    /// Path of the lock file guarding `archive`.
    ///
    /// Existing archives are resolved first, so every alias of one file
    /// shares a lock.
    pub fn lock_path<P: AsRef<Path>>(archive: P) -> PathBuf {
        let archive = archive.as_ref();
        let archive = fs::canonicalize(archive).unwrap_or_else(|_| archive.to_path_buf());
        let mut path = archive.into_os_string();
        path.push(".lock");
        PathBuf::from(path)
    }

    /// Take the lock for `archive`, waiting at most `timeout` if given.
    pub fn acquire<P: AsRef<Path>>(archive: P, timeout: Option<Duration>) -> Result<ArchiveLock> {
        let path = Self::lock_path(archive);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| Error::Lock {
                path: path.clone(),
                source,
            })?;

        debug!("Waiting for lock on {}", path.display());
        let locked = match timeout {
            None => lock_blocking(&file).map(|()| true),
            Some(timeout) => lock_until(&file, Instant::now() + timeout),
        }
        .map_err(|err| Error::Lock {
            path: path.clone(),
            source: io::Error::from(err),
        })?;

        if !locked {
            return Err(Error::LockTimeout {
                path,
                timeout: timeout.unwrap_or_default(),
            });
        }
        debug!("Locked {}", path.display());

        Ok(ArchiveLock { path, file })
    }

    pub fn release(self) {
        drop(self)
    }
}

impl Drop for ArchiveLock {
    fn drop(&mut self) {
        if let Err(err) = flock(&self.file, FlockOperation::Unlock) {
            warn!("Failed to unlock {}: {}", self.path.display(), err);
        } else {
            debug!("Unlocked {}", self.path.display());
        }
    }
}

fn lock_blocking(file: &File) -> rustix::io::Result<()> {
    loop {
        match flock(file, FlockOperation::LockExclusive) {
            Err(Errno::INTR) => continue,
            res => return res,
        }
    }
}

/// Poll for the lock until `deadline`. `Ok(false)` means the deadline passed.
fn lock_until(file: &File, deadline: Instant) -> rustix::io::Result<bool> {
    loop {
        match flock(file, FlockOperation::NonBlockingLockExclusive) {
            Ok(()) => return Ok(true),
            Err(Errno::WOULDBLOCK) | Err(Errno::INTR) => {}
            Err(err) => return Err(err),
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}
