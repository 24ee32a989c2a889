// src/storage/db.rs

//! Database side of package storage
//!
//! The package row is the completion marker of an add: callers insert it
//! inside a savepoint together with the file rows, so a package either has
//! all of its metadata or none of it.

use super::FileTable;
use crate::db::models::{Package, SourceFile};
use crate::error::{Error, Result};
use crate::mirror::{SourcePackage, pkg_prefix};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Look up the stored row for `pkg`, if any
pub fn lookup_package(conn: &Connection, pkg: &SourcePackage) -> Result<Option<Package>> {
    Package::find(conn, &pkg.name, &pkg.version)
}

/// Insert metadata for `pkg`, whose sources are extracted at `dir`
///
/// Returns the file table: every regular file or symlink below `dir`,
/// keyed by its path relative to `dir`. When `dir` does not exist (the
/// filesystem backend is disabled) only the package row is written.
pub fn add_package(
    conn: &Connection,
    pkg: &SourcePackage,
    dir: &Path,
    sticky: bool,
) -> Result<FileTable> {
    debug!("Adding {} to the database", pkg);

    let mut row = Package::new(pkg.name.clone(), pkg.version.clone(), pkg.area.clone());
    row.sticky = sticky;
    let package_id = row.insert(conn)?;

    let mut file_table = FileTable::new();
    if !dir.is_dir() {
        return Ok(file_table);
    }

    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let file_type = entry.file_type();
        if !(file_type.is_file() || file_type.is_symlink()) {
            continue;
        }

        let relpath = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| Error::IoError(format!("{}: {}", entry.path().display(), e)))?
            .to_string_lossy()
            .into_owned();

        let mut file = SourceFile::new(package_id, relpath.clone());
        let file_id = file.insert(conn)?;
        file_table.insert(relpath, file_id);
    }

    debug!("Recorded {} files for {}", file_table.len(), pkg);
    Ok(file_table)
}

/// Delete the metadata of `pkg`; dependent rows cascade
pub fn remove_package(conn: &Connection, pkg: &SourcePackage, row: &Package) -> Result<()> {
    let id = row
        .id
        .ok_or_else(|| Error::NotFoundError(format!("{} has no database id", pkg)))?;

    debug!("Removing {} from the database", pkg);
    Package::delete(conn, id)
}

/// Drop `relpath` of a package from the database and from `file_table`
///
/// When `relpath` names a directory, every file below it goes too.
/// Returns the number of rows deleted.
pub fn remove_path(
    conn: &Connection,
    package_id: i64,
    relpath: &str,
    file_table: &mut FileTable,
) -> Result<usize> {
    let relpath = relpath.trim_end_matches('/');
    let below = format!("{}/", relpath);

    let mut paths: Vec<String> = file_table
        .keys()
        .filter(|path| path.as_str() == relpath || path.starts_with(&below))
        .cloned()
        .collect();
    if paths.is_empty() {
        paths.push(relpath.to_string());
    }

    let mut removed = 0;
    for path in paths {
        let file_id = match file_table.remove(&path) {
            Some(id) => Some(id),
            None => SourceFile::find(conn, package_id, &path)?.and_then(|f| f.id),
        };
        if let Some(file_id) = file_id {
            SourceFile::delete(conn, file_id)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Sorted, distinct name prefixes of every stored package
pub fn list_prefixes(conn: &Connection) -> Result<Vec<String>> {
    let prefixes: BTreeSet<String> = Package::list_names(conn)?
        .iter()
        .map(|name| pkg_prefix(name))
        .filter(|prefix| !prefix.is_empty())
        .collect();

    Ok(prefixes.into_iter().collect())
}
