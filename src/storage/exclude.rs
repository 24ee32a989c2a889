// src/storage/exclude.rs

//! File exclusion specs
//!
//! An exclusion file holds control paragraphs like:
//!
//! ```text
//! Package: firefox-esr
//! Files: *.orig.tar.gz
//!  third_party/**/*.bin
//! Explanation: large upstream blobs
//! ```
//!
//! `Files` patterns are globs relative to the package extraction directory.

use crate::error::{Error, Result};
use crate::mirror::SourcePackage;
use glob::{MatchOptions, Pattern};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::debug;

/// One paragraph of an exclusion file
#[derive(Debug, Deserialize)]
struct ExclusionEntry {
    #[serde(rename = "Package")]
    package: Option<String>,
    #[serde(rename = "Files")]
    files: Option<String>,
}

/// Files to drop from one source package after extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludeSpec {
    pub package: String,
    pub patterns: Vec<String>,
}

impl ExcludeSpec {
    pub fn new(package: &str, patterns: &[&str]) -> Self {
        Self {
            package: package.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn applies_to(&self, pkg: &SourcePackage) -> bool {
        self.package == pkg.name
    }

    /// Paths below `base_dir` matched by this spec, relative to `base_dir`
    ///
    /// Returns nothing when the spec is for another package. Results are
    /// sorted and free of duplicates.
    pub fn matching_files(&self, base_dir: &Path, pkg: &SourcePackage) -> Result<Vec<String>> {
        if !self.applies_to(pkg) {
            return Ok(Vec::new());
        }

        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: true,
        };
        let escaped_base = Pattern::escape(&base_dir.to_string_lossy());

        let mut matches = BTreeSet::new();
        for pattern in &self.patterns {
            let full = format!("{}/{}", escaped_base, pattern.trim_start_matches('/'));
            for entry in glob::glob_with(&full, options)? {
                let path = entry.map_err(|e| Error::IoError(e.to_string()))?;
                if let Ok(rel) = path.strip_prefix(base_dir) {
                    matches.insert(rel.to_string_lossy().into_owned());
                }
            }
        }

        debug!(
            "{} files of {} match exclusion patterns",
            matches.len(),
            pkg
        );
        Ok(matches.into_iter().collect())
    }
}

/// Parse exclusion specs from control-paragraph text
pub fn parse(text: &str) -> Result<Vec<ExcludeSpec>> {
    let mut specs = Vec::new();

    let entries: Vec<ExclusionEntry> = rfc822_like::from_str(text)
        .map_err(|e| Error::ParseError(format!("exclusion file: {}", e)))?;

    for entry in entries {
        let package = entry.package.ok_or_else(|| {
            Error::ParseError("exclusion entry without a Package field".to_string())
        })?;
        let files = entry.files.ok_or_else(|| {
            Error::ParseError(format!("exclusion entry for {} has no Files field", package))
        })?;

        let patterns: Vec<String> = files.split_whitespace().map(String::from).collect();
        for pattern in &patterns {
            Pattern::new(pattern)?;
        }

        specs.push(ExcludeSpec { package, patterns });
    }

    Ok(specs)
}

/// Load exclusion specs from the file at `path`
pub fn load(path: &Path) -> Result<Vec<ExcludeSpec>> {
    let text = fs::read_to_string(path)?;
    parse(&text)
}
