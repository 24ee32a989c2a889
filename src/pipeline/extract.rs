// src/pipeline/extract.rs

//! Extract stage: add packages new on the mirror
//!
//! The database row is the completion marker. A package with a row was
//! fully added by an earlier run and is skipped; a package without one is
//! redone from scratch, overwriting whatever partial extraction is left.

use super::{SourceEntry, UpdateStatus, Updater, for_each_item, replay_triggers};
use crate::context::Backend;
use crate::db;
use crate::error::{Error, Result};
use crate::hooks::Event;
use crate::mirror::{MirrorView, SourcePackage};
use crate::storage::{self, FileTable};
use rusqlite::{Connection, Transaction};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, error, info, warn};

pub fn run(
    updater: &Updater,
    conn: &mut Connection,
    mirror: &dyn MirrorView,
    status: &mut UpdateStatus,
) -> Result<()> {
    info!("add new packages...");
    updater.ensure_cache_dir()?;

    let config = updater.config();
    let (mut added, mut failed) = (0usize, 0usize);

    for_each_item(conn, config.single_transaction, mirror.ls(), |tx, pkg| {
        if storage::db::lookup_package(tx, pkg)?.is_none() {
            match add_package(updater, tx, pkg, &config.mirror_dir, false) {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(_) => failed += 1,
            }
        }

        let Some(pkgdir) = pkg.extraction_dir(&config.sources_dir) else {
            return Ok(());
        };
        replay_triggers(updater, tx, Event::AddPackage, pkg, &pkgdir);
        status.record(pkg.id(), source_entry(pkg, &pkgdir, &config.sources_dir));
        Ok(())
    })?;

    info!("added {} packages, {} failed", added, failed);
    Ok(())
}

/// Add `pkg` to filesystem and database storage and notify observers
///
/// The `.dsc` descriptor is read from below `mirror_root`. Returns `false`
/// when the package was skipped. Any failure is logged and returned after
/// the package's database rows have been rolled back.
pub(crate) fn add_package(
    updater: &Updater,
    tx: &mut Transaction<'_>,
    pkg: &SourcePackage,
    mirror_root: &Path,
    sticky: bool,
) -> Result<bool> {
    info!("add {}...", pkg);
    try_add_package(updater, tx, pkg, mirror_root, sticky).inspect_err(|e| {
        error!("failed to add {}: {}", pkg, e);
    })
}

fn try_add_package(
    updater: &Updater,
    tx: &mut Transaction<'_>,
    pkg: &SourcePackage,
    mirror_root: &Path,
    sticky: bool,
) -> Result<bool> {
    let ctx = updater.context();
    let config = updater.config();

    let Some(pkgdir) = pkg.extraction_dir(&config.sources_dir) else {
        warn!("package {} has no extraction dir, skipping", pkg);
        return Ok(false);
    };

    if ctx.should_write(Backend::Fs) {
        let dsc = pkg.dsc_path(mirror_root).ok_or_else(|| {
            Error::ExtractionError(format!("{} has no .dsc location on the mirror", pkg))
        })?;
        updater.storage().extract(pkg, &dsc, &pkgdir)?;
    }

    db::nested(tx, |conn| {
        let mut file_table = if ctx.should_write(Backend::Db) {
            Some(storage::db::add_package(conn, pkg, &pkgdir, sticky)?)
        } else {
            None
        };

        exclude_files(updater, conn, pkg, &pkgdir, file_table.as_mut())?;

        if ctx.should_write(Backend::Hooks) {
            updater
                .notifier()
                .notify(Event::AddPackage, conn, pkg, &pkgdir, file_table.as_ref())?;
        }
        Ok(())
    })?;

    Ok(true)
}

/// Drop the files of `pkg` matched by exclusion specs from both storages
fn exclude_files(
    updater: &Updater,
    conn: &Connection,
    pkg: &SourcePackage,
    pkgdir: &Path,
    mut file_table: Option<&mut FileTable>,
) -> Result<()> {
    let mut candidates = BTreeSet::new();
    for spec in updater.exclude().iter().filter(|spec| spec.applies_to(pkg)) {
        candidates.extend(spec.matching_files(pkgdir, pkg)?);
    }
    if candidates.is_empty() {
        return Ok(());
    }

    info!("excluding {} files from {}", candidates.len(), pkg);
    let ctx = updater.context();
    let package_id = match storage::db::lookup_package(conn, pkg)? {
        Some(row) => row.id,
        None => None,
    };

    for relpath in &candidates {
        debug!("excluding file {}", relpath);
        if ctx.should_write(Backend::Fs) {
            updater.storage().remove_file(pkgdir, relpath)?;
        }
        if let (Some(table), Some(package_id)) = (file_table.as_deref_mut(), package_id) {
            let removed = storage::db::remove_path(conn, package_id, relpath, table)?;
            debug!("dropped {} file rows for {}", removed, relpath);
        }
    }
    Ok(())
}

fn source_entry(pkg: &SourcePackage, pkgdir: &Path, sources_dir: &Path) -> SourceEntry {
    let dsc_rel = match (&pkg.directory, &pkg.dsc) {
        (Some(dir), Some(dsc)) => format!("{}/{}", dir.trim_end_matches('/'), dsc),
        _ => String::new(),
    };
    let extraction_rel = pkgdir
        .strip_prefix(sources_dir)
        .unwrap_or(pkgdir)
        .to_string_lossy()
        .into_owned();

    SourceEntry {
        area: pkg.area.clone(),
        dsc_rel,
        extraction_rel,
        suites: Vec::new(),
    }
}
