// src/mirror/mod.rs

//! Mirror view: which source packages the upstream mirror currently carries
//!
//! The pipeline only depends on the [`MirrorView`] trait. [`SourceMirror`]
//! implements it by reading the `Sources` indices of a local archive mirror.

mod scan;

pub use scan::SourceMirror;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// The natural key of a source package across mirror, database and filesystem
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId {
    pub name: String,
    pub version: String,
}

impl PackageId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// A source package as described by the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePackage {
    pub name: String,
    pub version: String,
    /// Archive area (main, contrib, non-free, ...)
    pub area: String,
    /// Pool directory relative to the mirror root
    pub directory: Option<String>,
    /// File name of the `.dsc` descriptor inside `directory`
    pub dsc: Option<String>,
}

impl SourcePackage {
    pub fn new(name: &str, version: &str, area: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            area: area.to_string(),
            directory: None,
            dsc: None,
        }
    }

    /// Rebuild a descriptor from a stored package row
    ///
    /// The descriptor location is unknown for such packages, which is fine
    /// for removal: only the extraction directory is needed.
    pub fn from_row(name: &str, version: &str, area: &str) -> Self {
        Self::new(name, version, area)
    }

    pub fn with_dsc(mut self, directory: &str, dsc: &str) -> Self {
        self.directory = Some(directory.to_string());
        self.dsc = Some(dsc.to_string());
        self
    }

    pub fn id(&self) -> PackageId {
        PackageId::new(&self.name, &self.version)
    }

    /// Prefix bucket of this package's name (see [`pkg_prefix`])
    pub fn prefix(&self) -> String {
        pkg_prefix(&self.name)
    }

    /// Absolute path of the `.dsc` descriptor, if known
    pub fn dsc_path(&self, mirror_dir: &Path) -> Option<PathBuf> {
        match (&self.directory, &self.dsc) {
            (Some(dir), Some(dsc)) => Some(mirror_dir.join(dir).join(dsc)),
            _ => None,
        }
    }

    /// Where this package is extracted: `sources_dir/area/prefix/name/version`
    ///
    /// Returns `None` when a path component would escape its parent or be
    /// empty. The version's epoch is not part of the path.
    pub fn extraction_dir(&self, sources_dir: &Path) -> Option<PathBuf> {
        let version = strip_epoch(&self.version);
        let components = [self.area.as_str(), self.name.as_str(), version];
        if components.iter().any(|c| !is_safe_component(c)) {
            return None;
        }

        Some(
            sources_dir
                .join(&self.area)
                .join(self.prefix())
                .join(&self.name)
                .join(version),
        )
    }
}

impl fmt::Display for SourcePackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// Pool-style prefix of a package name: `libX` for `lib*` names, else the first letter
pub fn pkg_prefix(name: &str) -> String {
    if let Some(rest) = name.strip_prefix("lib")
        && let Some(c) = rest.chars().next()
    {
        return format!("lib{c}");
    }
    name.chars().next().map(String::from).unwrap_or_default()
}

fn strip_epoch(version: &str) -> &str {
    version.split_once(':').map_or(version, |(_, rest)| rest)
}

fn is_safe_component(component: &str) -> bool {
    !component.is_empty() && component != "." && component != ".." && !component.contains('/')
}

/// Read-only view of the packages available on the mirror
pub trait MirrorView {
    /// Every package on the mirror, each identity once, in a stable order
    fn ls(&self) -> &[SourcePackage];

    /// Suite name to the identities it contains
    fn suites(&self) -> &BTreeMap<String, BTreeSet<PackageId>>;

    /// Identities of every package on the mirror
    fn packages(&self) -> &HashSet<PackageId>;

    /// Packages belonging to `suite`, in [`MirrorView::ls`] order
    fn ls_suite(&self, suite: &str) -> Vec<&SourcePackage> {
        match self.suites().get(suite) {
            Some(ids) => self.ls().iter().filter(|pkg| ids.contains(&pkg.id())).collect(),
            None => Vec::new(),
        }
    }
}
