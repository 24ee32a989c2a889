// src/mirror/scan.rs

//! Scan a local archive mirror
//!
//! Layout expected under the mirror root:
//!
//! ```text
//! dists/<suite>/<area>/source/Sources.gz   (or plain Sources)
//! pool/<area>/<prefix>/<name>/<name>_<version>.dsc
//! ```
//!
//! Suite directories that are symlinks (`stable -> bookworm`) are aliases
//! and are skipped.

use super::{MirrorView, PackageId, SourcePackage};
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The fields of a `Sources` index paragraph that the mirror view reads
#[derive(Debug, Deserialize)]
struct SourcesEntry {
    #[serde(rename = "Package")]
    package: Option<String>,
    #[serde(rename = "Version")]
    version: Option<String>,
    #[serde(rename = "Directory")]
    directory: Option<String>,
    #[serde(rename = "Files")]
    files: Option<String>,
    #[serde(rename = "Checksums-Sha256")]
    checksums_sha256: Option<String>,
}

/// Snapshot of a mirror's package listing
#[derive(Debug, Clone, Default)]
pub struct SourceMirror {
    root: PathBuf,
    packages: Vec<SourcePackage>,
    suites: BTreeMap<String, BTreeSet<PackageId>>,
    ids: HashSet<PackageId>,
}

impl SourceMirror {
    /// Scan the mirror rooted at `root`
    pub fn scan(root: &Path) -> Result<Self> {
        info!("Scanning mirror at {}", root.display());

        let dists = root.join("dists");
        if !dists.is_dir() {
            return Err(Error::MirrorError(format!(
                "{} has no dists/ directory",
                root.display()
            )));
        }

        let mut mirror = Self {
            root: root.to_path_buf(),
            ..Self::default()
        };

        for suite_dir in sorted_subdirs(&dists)? {
            let suite = file_name(&suite_dir);
            if fs::symlink_metadata(&suite_dir)?.file_type().is_symlink() {
                debug!("Skipping suite alias {}", suite);
                continue;
            }

            for area_dir in sorted_subdirs(&suite_dir)? {
                let area = file_name(&area_dir);
                let Some(text) = read_sources_index(&area_dir.join("source"))? else {
                    continue;
                };

                let entries: Vec<SourcesEntry> = rfc822_like::from_str(&text).map_err(|e| {
                    Error::ParseError(format!("{}/{} Sources index: {}", suite, area, e))
                })?;
                for entry in &entries {
                    match package_from_entry(entry, &area) {
                        Some(pkg) => mirror.add(&suite, pkg),
                        None => warn!(
                            "Skipping malformed entry in {}/{} Sources index",
                            suite, area
                        ),
                    }
                }
            }
        }

        info!(
            "Mirror lists {} packages in {} suites",
            mirror.packages.len(),
            mirror.suites.len()
        );
        Ok(mirror)
    }

    /// Build a mirror view from explicit `(suite, package)` memberships
    pub fn from_entries<I>(root: &Path, entries: I) -> Self
    where
        I: IntoIterator<Item = (String, SourcePackage)>,
    {
        let mut mirror = Self {
            root: root.to_path_buf(),
            ..Self::default()
        };
        for (suite, pkg) in entries {
            mirror.add(&suite, pkg);
        }
        mirror
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn add(&mut self, suite: &str, pkg: SourcePackage) {
        let id = pkg.id();
        self.suites
            .entry(suite.to_string())
            .or_default()
            .insert(id.clone());
        if self.ids.insert(id) {
            self.packages.push(pkg);
        }
    }
}

impl MirrorView for SourceMirror {
    fn ls(&self) -> &[SourcePackage] {
        &self.packages
    }

    fn suites(&self) -> &BTreeMap<String, BTreeSet<PackageId>> {
        &self.suites
    }

    fn packages(&self) -> &HashSet<PackageId> {
        &self.ids
    }
}

fn package_from_entry(entry: &SourcesEntry, area: &str) -> Option<SourcePackage> {
    let name = entry.package.as_deref()?;
    let version = entry.version.as_deref()?;
    let mut pkg = SourcePackage::new(name, version, area);

    let dsc = entry
        .files
        .as_deref()
        .or(entry.checksums_sha256.as_deref())
        .and_then(dsc_name);
    if let (Some(directory), Some(dsc)) = (entry.directory.as_deref(), dsc) {
        pkg = pkg.with_dsc(directory, dsc);
    }

    Some(pkg)
}

/// Pick the `.dsc` file name out of a `Files:` field (`checksum size name` triples)
fn dsc_name(files: &str) -> Option<&str> {
    files
        .split_whitespace()
        .find(|token| token.ends_with(".dsc"))
}

fn read_sources_index(source_dir: &Path) -> Result<Option<String>> {
    let gz = source_dir.join("Sources.gz");
    if gz.is_file() {
        let mut text = String::new();
        GzDecoder::new(File::open(&gz)?)
            .read_to_string(&mut text)
            .map_err(|e| Error::MirrorError(format!("cannot read {}: {}", gz.display(), e)))?;
        return Ok(Some(text));
    }

    let plain = source_dir.join("Sources");
    if plain.is_file() {
        return Ok(Some(fs::read_to_string(&plain)?));
    }

    Ok(None)
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const SID_SOURCES: &str = "\
Package: hello
Version: 2.10-3
Directory: pool/main/h/hello
Files:
 0123 1500 hello_2.10-3.dsc
 4567 725946 hello_2.10.orig.tar.gz

Package: libfoo
Version: 1.0-1
Directory: pool/main/libf/libfoo
Files:
 89ab 900 libfoo_1.0-1.dsc
";

    fn write_index(root: &Path, suite: &str, area: &str, text: &str, gzip: bool) {
        let dir = root.join("dists").join(suite).join(area).join("source");
        fs::create_dir_all(&dir).unwrap();
        if gzip {
            let mut encoder = GzEncoder::new(File::create(dir.join("Sources.gz")).unwrap(), Compression::default());
            encoder.write_all(text.as_bytes()).unwrap();
            encoder.finish().unwrap();
        } else {
            fs::write(dir.join("Sources"), text).unwrap();
        }
    }

    #[test]
    fn test_scan_reads_suites_and_areas() {
        let temp = tempfile::tempdir().unwrap();
        write_index(temp.path(), "sid", "main", SID_SOURCES, true);
        write_index(
            temp.path(),
            "bookworm",
            "main",
            "Package: hello\nVersion: 2.10-3\nDirectory: pool/main/h/hello\nFiles:\n 0123 1500 hello_2.10-3.dsc\n",
            false,
        );

        let mirror = SourceMirror::scan(temp.path()).unwrap();

        assert_eq!(mirror.ls().len(), 2);
        assert_eq!(mirror.suites().len(), 2);
        assert!(mirror.packages().contains(&PackageId::new("libfoo", "1.0-1")));
        assert_eq!(mirror.suites()["bookworm"].len(), 1);
        assert_eq!(mirror.ls_suite("sid").len(), 2);

        let hello = &mirror.ls()[0];
        assert_eq!(hello.name, "hello");
        assert_eq!(
            hello.dsc_path(temp.path()),
            Some(temp.path().join("pool/main/h/hello/hello_2.10-3.dsc"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_skips_suite_aliases() {
        let temp = tempfile::tempdir().unwrap();
        write_index(temp.path(), "bookworm", "main", SID_SOURCES, false);
        std::os::unix::fs::symlink("bookworm", temp.path().join("dists/stable")).unwrap();

        let mirror = SourceMirror::scan(temp.path()).unwrap();
        assert_eq!(mirror.suites().keys().collect::<Vec<_>>(), vec!["bookworm"]);
    }

    #[test]
    fn test_scan_skips_entries_without_version() {
        let temp = tempfile::tempdir().unwrap();
        write_index(
            temp.path(),
            "sid",
            "contrib",
            "Package: broken\nDirectory: pool/contrib/b/broken\n\nPackage: ok\nVersion: 1\n",
            false,
        );

        let mirror = SourceMirror::scan(temp.path()).unwrap();
        assert_eq!(mirror.ls().len(), 1);
        assert_eq!(mirror.ls()[0].name, "ok");
        assert_eq!(mirror.ls()[0].area, "contrib");
        assert_eq!(mirror.ls()[0].dsc_path(temp.path()), None);
    }

    #[test]
    fn test_dsc_name_from_files_field() {
        assert_eq!(
            dsc_name("0123 1500 hello_2.10-3.dsc\n4567 725946 hello_2.10.orig.tar.gz"),
            Some("hello_2.10-3.dsc")
        );
        assert_eq!(dsc_name("4567 725946 hello_2.10.orig.tar.gz"), None);
    }

    #[test]
    fn test_scan_requires_dists() {
        let temp = tempfile::tempdir().unwrap();
        assert!(SourceMirror::scan(temp.path()).is_err());
    }

    #[test]
    fn test_from_entries_dedups_identities() {
        let pkg = SourcePackage::new("hello", "1.0", "main");
        let mirror = SourceMirror::from_entries(
            Path::new("/mirror"),
            [("sid".to_string(), pkg.clone()), ("trixie".to_string(), pkg)],
        );
        assert_eq!(mirror.ls().len(), 1);
        assert_eq!(mirror.suites().len(), 2);
    }
}
