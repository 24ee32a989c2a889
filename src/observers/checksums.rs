// src/observers/checksums.rs

//! SHA-256 checksums of every regular file in a package

use crate::db::models::{Checksum, Package, SourceFile};
use crate::error::{Error, Result};
use crate::hooks::{Event, Observer};
use crate::mirror::SourcePackage;
use crate::storage::FileTable;
use crate::storage::fs::{sidecar_path, write_atomic};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

pub const TITLE: &str = "checksums";

/// Records file checksums in the database, and optionally in a
/// `<pkgdir>.checksums` file next to the extraction
#[derive(Debug, Clone)]
pub struct ChecksumsObserver {
    write_sidecar: bool,
}

impl ChecksumsObserver {
    pub fn new(write_sidecar: bool) -> Self {
        Self { write_sidecar }
    }

    fn add(
        &self,
        conn: &Connection,
        pkg: &SourcePackage,
        pkgdir: &Path,
        file_table: Option<&FileTable>,
    ) -> Result<()> {
        let package_id = package_id(conn, pkg)?;

        let files: FileTable = match file_table {
            Some(table) => table.clone(),
            None => SourceFile::find_by_package(conn, package_id)?
                .into_iter()
                .filter_map(|f| f.id.map(|id| (f.path, id)))
                .collect(),
        };

        // Replays start from a clean slate
        Checksum::delete_for_package(conn, package_id)?;

        let mut lines = Vec::new();
        for (relpath, file_id) in &files {
            let path = pkgdir.join(relpath);
            match fs::symlink_metadata(&path) {
                Ok(meta) if meta.is_file() => {}
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }

            let sha256 = sha256_file(&path)?;
            Checksum::new(package_id, *file_id, sha256.clone()).insert(conn)?;
            lines.push((sha256, relpath.as_str()));
        }

        debug!("Stored {} checksums for {}", lines.len(), pkg);

        if self.write_sidecar && pkgdir.is_dir() {
            write_atomic(&sidecar_path(pkgdir, "checksums"), |out| {
                for (sha256, relpath) in &lines {
                    writeln!(out, "{}  {}", sha256, relpath)?;
                }
                Ok(())
            })?;
        }

        Ok(())
    }

    fn remove(&self, conn: &Connection, pkg: &SourcePackage, pkgdir: &Path) -> Result<()> {
        if let Some(row) = Package::find(conn, &pkg.name, &pkg.version)?
            && let Some(id) = row.id
        {
            Checksum::delete_for_package(conn, id)?;
        }

        let sidecar = sidecar_path(pkgdir, "checksums");
        if self.write_sidecar && sidecar.exists() {
            fs::remove_file(&sidecar)?;
        }
        Ok(())
    }
}

impl Observer for ChecksumsObserver {
    fn title(&self) -> &str {
        TITLE
    }

    fn notify(
        &self,
        conn: &Connection,
        event: Event,
        pkg: &SourcePackage,
        pkgdir: &Path,
        file_table: Option<&FileTable>,
    ) -> Result<()> {
        match event {
            Event::AddPackage => self.add(conn, pkg, pkgdir, file_table),
            Event::RmPackage => self.remove(conn, pkg, pkgdir),
        }
    }
}

/// Stored ID of `pkg`; observers only run for packages with a row
fn package_id(conn: &Connection, pkg: &SourcePackage) -> Result<i64> {
    Package::find(conn, &pkg.name, &pkg.version)?
        .and_then(|row| row.id)
        .ok_or_else(|| Error::NotFoundError(format!("{} is not in the database", pkg)))
}

/// Hex SHA-256 of the file at `path`
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut file = File::open(path)?;
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
