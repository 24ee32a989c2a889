// src/pipeline/lock.rs

//! Exclusive lock held for the duration of an update run
//!
//! Two concurrent runs would interleave suite rebuilds and cache writes,
//! so the second one fails fast instead of waiting.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// An `flock(LOCK_EX)` on `<cache_dir>/update.lock`, released on drop
#[derive(Debug)]
pub struct UpdateLock {
    /// Kept open to hold the lock
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl UpdateLock {
    /// Take the lock without blocking
    ///
    /// Fails with a configuration error when another run holds it.
    pub fn try_acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired update lock at {}", path.display());
                let lock = Self {
                    file,
                    path: path.to_path_buf(),
                };
                lock.write_pid()?;
                Ok(lock)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                let holder = Self::holder_pid(path)
                    .map(|pid| format!(" (pid {pid})"))
                    .unwrap_or_default();
                info!("Update lock {} is held{}", path.display(), holder);
                Err(Error::ConfigError("another update is running".to_string()))
            }
            Err(e) => Err(Error::IoError(format!(
                "failed to lock {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Whether some process currently holds the lock at `path`
    pub fn is_held(path: &Path) -> bool {
        let Ok(file) = File::open(path) else {
            return false;
        };
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = file.unlock();
                false
            }
            Err(_) => true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID recorded by the current holder, if any
    pub fn holder_pid(path: &Path) -> Option<u32> {
        fs::read_to_string(path.with_extension("pid"))
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    fn write_pid(&self) -> Result<()> {
        fs::write(self.path.with_extension("pid"), std::process::id().to_string())?;
        Ok(())
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(self.path.with_extension("pid"));
        debug!("Released update lock at {}", self.path.display());
    }
}
