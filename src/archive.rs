// src/archive.rs

//! Sticky suites: archived releases kept forever
//!
//! A sticky suite is added once from an archive mirror. Its packages are
//! flagged sticky, which exempts them from the regular GC stage; they only
//! leave when the suite itself is removed here.

use crate::context::Backend;
use crate::db::{
    self,
    models::{Package, SuiteInfo, SuiteMapping},
};
use crate::error::{Error, Result};
use crate::mirror::{MirrorView, SourcePackage};
use crate::pipeline::{self, Stage, Updater, extract, gc, suites};
use crate::statistics::cache::{self, suite_scope};
use crate::storage;
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Where a suite is known from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuiteState {
    /// Listed on the archive mirror
    pub archive: bool,
    /// Registered as a sticky suite in the database
    pub db: bool,
}

/// Every suite either on the archive mirror or stored as sticky
pub fn list_suites(
    conn: &Connection,
    archive: &dyn MirrorView,
) -> Result<BTreeMap<String, SuiteState>> {
    let mut suites: BTreeMap<String, SuiteState> = BTreeMap::new();
    for name in archive.suites().keys() {
        suites.entry(name.clone()).or_default().archive = true;
    }
    for name in SuiteInfo::sticky_suites(conn)? {
        suites.entry(name).or_default().db = true;
    }
    Ok(suites)
}

/// Add `suite` from the archive mirror as a sticky suite
///
/// Packages already present are flagged sticky; missing ones are added
/// from the archive. Statistics, cache and charts are refreshed for the
/// suite according to the configured stages. Packages that fail to add
/// are left out and reported as an error after the refresh; running the
/// command again retries them.
pub fn add_suite(
    updater: &Updater,
    conn: &mut Connection,
    archive: &dyn MirrorView,
    suite: &str,
) -> Result<()> {
    if !archive.suites().contains_key(suite) {
        return Err(Error::NotFoundError(format!(
            "suite {suite} is not on the archive mirror"
        )));
    }

    let _lock = updater.lock()?;
    info!("add sticky suite {}...", suite);
    let config = updater.config();
    let stages = &config.stages;
    let write_db = updater.context().should_write(Backend::Db);
    let packages = archive.ls_suite(suite);
    let mut failed = 0usize;

    if stages.contains(&Stage::Extract) {
        db::transaction(conn, |tx| {
            if write_db && SuiteInfo::find(tx, suite)?.is_none() {
                suites::add_suite_info(tx, suite, true)?;
            }
            Ok(())
        })?;

        let archive_root = config.archive_mirror_dir();
        pipeline::for_each_item(conn, config.single_transaction, &packages, |tx, pkg| {
            match storage::db::lookup_package(tx, pkg)? {
                Some(row) if row.sticky => {}
                Some(row) => {
                    debug!("flagging {} sticky", pkg);
                    if let (true, Some(id)) = (write_db, row.id) {
                        Package::set_sticky(tx, id, true)?;
                    }
                }
                None => {
                    if extract::add_package(updater, tx, pkg, archive_root, true).is_err() {
                        failed += 1;
                    }
                }
            }
            Ok(())
        })?;
    }

    if stages.contains(&Stage::Suites) && write_db {
        db::transaction(conn, |tx| {
            for pkg in &packages {
                let Some(id) = storage::db::lookup_package(tx, pkg)?.and_then(|row| row.id) else {
                    warn!("missing package {} in suite {}, skipping", pkg, suite);
                    continue;
                };
                if SuiteMapping::find(tx, id, suite)?.is_none() {
                    SuiteMapping::new(id, suite.to_string()).insert(tx)?;
                }
            }
            Ok(())
        })?;
    }

    let only = [suite.to_string()];
    refresh(updater, conn, Some(only.as_slice()))?;

    if failed > 0 {
        return Err(Error::ArchiveError(format!(
            "{failed} packages of suite {suite} could not be added"
        )));
    }
    Ok(())
}

/// Remove the sticky suite `suite`
///
/// Its packages are removed unless another suite still lists them; such
/// packages lose their sticky flag when none of their remaining suites is
/// sticky, so regular GC takes over.
///
/// When a package cannot be removed, it keeps its mapping and the suite
/// stays registered, so the command can be run again.
pub fn remove_suite(updater: &Updater, conn: &mut Connection, suite: &str) -> Result<()> {
    match SuiteInfo::find(conn, suite)? {
        Some(info) if info.sticky => {}
        _ => {
            return Err(Error::NotFoundError(format!("unknown sticky suite {suite}")));
        }
    }

    let _lock = updater.lock()?;
    info!("remove sticky suite {}...", suite);
    let config = updater.config();
    let ctx = updater.context();
    let write_db = ctx.should_write(Backend::Db);

    if config.stages.contains(&Stage::Gc) {
        let mut failed = 0usize;
        let sticky_suites: BTreeSet<String> =
            SuiteInfo::sticky_suites(conn)?.into_iter().collect();
        let rows = Package::list_sticky_in_suite(conn, suite)?;

        pipeline::for_each_item(conn, config.single_transaction, rows, |tx, row| {
            let Some(id) = row.id else {
                return Ok(());
            };
            let pkg = SourcePackage::from_row(&row.name, &row.version, &row.area);
            let others: Vec<String> = SuiteMapping::suites_of(tx, id)?
                .into_iter()
                .filter(|s| s != suite)
                .collect();

            if others.is_empty() {
                if gc::remove_package(updater, tx, &pkg, &row).is_err() {
                    failed += 1;
                }
            } else if write_db {
                if !others.iter().any(|s| sticky_suites.contains(s)) {
                    debug!("{} is no longer sticky", pkg);
                    Package::set_sticky(tx, id, false)?;
                }
                SuiteMapping::delete(tx, id, suite)?;
            }
            Ok(())
        })?;

        if failed > 0 {
            return Err(Error::ArchiveError(format!(
                "{failed} packages of suite {suite} could not be removed, keeping the suite"
            )));
        }

        if write_db {
            db::transaction(conn, |tx| {
                SuiteMapping::delete_suite(tx, suite)?;
                SuiteInfo::delete(tx, suite)
            })?;
        }
    }

    if config.stages.contains(&Stage::Stats) && ctx.should_write(Backend::Fs) {
        let path = config.stats_cache_path();
        let mut stats = cache::load(&path)?;
        let pruned = cache::prune_scope(&mut stats, &suite_scope(suite));
        cache::save(&stats, &path)?;
        debug!("pruned {} cached statistics of {}", pruned, suite);
    }

    refresh(updater, conn, None)
}

/// Re-run the post-processing stages after a suite change
fn refresh(updater: &Updater, conn: &mut Connection, suites: Option<&[String]>) -> Result<()> {
    let stages = &updater.config().stages;
    if stages.contains(&Stage::Stats) {
        pipeline::stats::run(updater, conn, suites)?;
    }
    if stages.contains(&Stage::Cache) {
        pipeline::cache::run(updater, conn)?;
    }
    if stages.contains(&Stage::Charts) {
        pipeline::charts::run(updater, conn, suites)?;
    }
    Ok(())
}
