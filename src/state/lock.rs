// src/state/lock.rs

//! Process-level lock on the installed state
//!
//! Commands that modify the installed state hold an exclusive lock for the
//! whole run so two foampm processes never interleave installs. Read-only
//! commands take a shared lock.
//!
//! # Example
//!
//! ```ignore
//! use foampm::state::StateLock;
//!
//! let _lock = StateLock::exclusive(&config.lock_file())?;
//! // ... resolve and apply ...
//! // Lock released on drop
//! ```

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Advisory lock held on a lock file for as long as the value lives
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    /// Acquire an exclusive lock, blocking until available
    pub fn exclusive<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (file, path) = Self::open(path.as_ref())?;
        file.lock_exclusive()
            .map_err(|e| Error::StoreUnavailable(format!("Failed to lock {:?}: {}", path, e)))?;
        debug!("Acquired exclusive state lock at {:?}", path);
        Ok(Self { file, path })
    }

    /// Acquire a shared lock, blocking while an exclusive holder exists
    pub fn shared<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (file, path) = Self::open(path.as_ref())?;
        file.lock_shared()
            .map_err(|e| Error::StoreUnavailable(format!("Failed to lock {:?}: {}", path, e)))?;
        debug!("Acquired shared state lock at {:?}", path);
        Ok(Self { file, path })
    }

    /// Try to acquire an exclusive lock without blocking
    ///
    /// Returns `Ok(None)` if another process holds the lock.
    pub fn try_exclusive<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let (file, path) = Self::open(path.as_ref())?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired exclusive state lock at {:?}", path);
                Ok(Some(Self { file, path }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                debug!("State lock already held at {:?}", path);
                Ok(None)
            }
            // fs2 reports contention as its own error kind on some platforms
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(Error::StoreUnavailable(format!(
                "Failed to try-lock {:?}: {}",
                path, e
            ))),
        }
    }

    fn open(path: &Path) -> Result<(File, PathBuf)> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok((file, path.to_path_buf()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!("Released state lock at {:?}", self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("foampm.lock");

        let lock = StateLock::exclusive(&path).unwrap();
        assert_eq!(lock.path(), path.as_path());
        assert!(StateLock::try_exclusive(&path).unwrap().is_none());

        drop(lock);
        assert!(StateLock::try_exclusive(&path).unwrap().is_some());
    }

    #[test]
    fn test_shared_blocks_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foampm.lock");

        let _shared = StateLock::shared(&path).unwrap();
        assert!(StateLock::try_exclusive(&path).unwrap().is_none());
    }
}
