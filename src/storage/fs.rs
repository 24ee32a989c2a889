// src/storage/fs.rs

//! Filesystem storage: extracted source trees under `sources_dir`

use crate::error::{Error, Result};
use crate::mirror::SourcePackage;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Filesystem side of package storage
pub trait FsStorage {
    /// Extract `pkg` from its descriptor at `dsc` into `dir`
    ///
    /// Any previous (possibly partial) content of `dir` is replaced.
    fn extract(&self, pkg: &SourcePackage, dsc: &Path, dir: &Path) -> Result<()>;

    /// Remove the extraction of `pkg` at `dir`
    fn remove(&self, pkg: &SourcePackage, dir: &Path) -> Result<()>;

    /// Remove a single path (file or directory) below `dir`
    fn remove_file(&self, dir: &Path, relpath: &str) -> Result<()> {
        let path = dir.join(relpath);
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// Extracts packages with `dpkg-source`
#[derive(Debug, Clone)]
pub struct DpkgSource {
    sources_dir: PathBuf,
}

impl DpkgSource {
    pub fn new(sources_dir: &Path) -> Self {
        Self {
            sources_dir: sources_dir.to_path_buf(),
        }
    }

    /// Remove now-empty directories between `dir` and `sources_dir`
    fn prune_empty_parents(&self, dir: &Path) {
        let mut current = dir.parent();
        while let Some(parent) = current {
            if parent == self.sources_dir || !parent.starts_with(&self.sources_dir) {
                break;
            }
            // remove_dir only succeeds on empty directories
            if fs::remove_dir(parent).is_err() {
                break;
            }
            current = parent.parent();
        }
    }
}

impl FsStorage for DpkgSource {
    fn extract(&self, pkg: &SourcePackage, dsc: &Path, dir: &Path) -> Result<()> {
        debug!("Extracting {} to {}", pkg, dir.display());

        if dir.exists() {
            warn!("Removing stale extraction of {} at {}", pkg, dir.display());
            fs::remove_dir_all(dir)?;
        }
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent)?;
        }

        let output = Command::new("dpkg-source")
            .args(["--no-copy", "--no-check", "-x"])
            .arg(dsc)
            .arg(dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                Error::ExtractionError(format!("failed to run dpkg-source for {}: {}", pkg, e))
            })?;

        let mut log = File::create(sidecar_path(dir, "log"))?;
        log.write_all(&output.stdout)?;
        log.write_all(&output.stderr)?;

        if !output.status.success() {
            return Err(Error::ExtractionError(format!(
                "dpkg-source exited with code {} for {}: {}",
                output.status.code().unwrap_or(-1),
                pkg,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }

    fn remove(&self, pkg: &SourcePackage, dir: &Path) -> Result<()> {
        debug!("Removing extraction of {} at {}", pkg, dir.display());

        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        let log = sidecar_path(dir, "log");
        if log.exists() {
            fs::remove_file(&log)?;
        }

        self.prune_empty_parents(dir);
        Ok(())
    }
}

/// `<dir>.<ext>`, a file stored next to an extraction directory
pub fn sidecar_path(dir: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(dir.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Replace `path` atomically
///
/// Content is written to `<path>.new` and renamed over `path` once complete,
/// so readers see either the old file or the new one, never a partial write.
/// On failure the temporary file is removed and `path` is left untouched.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let tmp = sidecar_path(path, "new");

    let result = (|| -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(&tmp)?);
        write(&mut out)?;
        out.flush()?;
        out.get_ref().sync_all()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(Error::IoError(format!(
            "failed to write {}: {}",
            path.display(),
            e
        )));
    }

    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_replaces_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("out.txt");
        fs::write(&path, "old\n").unwrap();

        write_atomic(&path, |out| writeln!(out, "new")).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        assert!(!sidecar_path(&path, "new").exists());
    }

    #[test]
    fn test_write_atomic_failure_keeps_old_content() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("out.txt");
        fs::write(&path, "old\n").unwrap();

        let result = write_atomic(&path, |out| {
            writeln!(out, "partial")?;
            Err(std::io::Error::other("disk full"))
        });

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\n");
        assert!(!sidecar_path(&path, "new").exists());
    }

    #[test]
    fn test_remove_prunes_empty_parents() {
        let temp = tempfile::tempdir().unwrap();
        let sources = temp.path().join("sources");
        let dir = sources.join("main/h/hello/1.0");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("README"), "hi").unwrap();
        fs::write(sidecar_path(&dir, "log"), "log").unwrap();
        fs::create_dir_all(sources.join("main/z/zlib/1.3")).unwrap();

        let storage = DpkgSource::new(&sources);
        storage
            .remove(&SourcePackage::new("hello", "1.0", "main"), &dir)
            .unwrap();

        assert!(!dir.exists());
        assert!(!sidecar_path(&dir, "log").exists());
        assert!(!sources.join("main/h").exists());
        assert!(sources.join("main/z/zlib/1.3").exists());
    }

    #[test]
    fn test_remove_file_handles_missing_and_dirs() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("debian/patches")).unwrap();
        fs::write(temp.path().join("debian/patches/series"), "").unwrap();

        let storage = DpkgSource::new(temp.path());
        storage.remove_file(temp.path(), "debian/patches").unwrap();
        storage.remove_file(temp.path(), "does-not-exist").unwrap();
        assert!(!temp.path().join("debian/patches").exists());
    }
}
