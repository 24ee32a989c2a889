// src/pipeline/gc.rs

//! GC stage: remove packages that left the mirror
//!
//! A package is removed once it is gone from the mirror and its
//! extraction is at least `expire-days` old. Sticky packages are never
//! collected here.

use super::{Updater, for_each_item, replay_triggers};
use crate::context::Backend;
use crate::db::{self, models::Package};
use crate::error::{Error, Result};
use crate::hooks::Event;
use crate::mirror::{MirrorView, SourcePackage};
use crate::storage;
use rusqlite::{Connection, Transaction};
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

pub fn run(updater: &Updater, conn: &mut Connection, mirror: &dyn MirrorView) -> Result<()> {
    info!("garbage collect...");
    let config = updater.config();
    let expire_days = u64::from(config.expire_days);
    let now = SystemTime::now();
    let mut removed = 0usize;

    let rows = Package::list_non_sticky(conn)?;
    for_each_item(conn, config.single_transaction, rows, |tx, row| {
        let pkg = SourcePackage::from_row(&row.name, &row.version, &row.area);
        let Some(pkgdir) = pkg.extraction_dir(&config.sources_dir) else {
            warn!("package {} has no extraction dir, skipping", pkg);
            return Ok(());
        };

        if !mirror.packages().contains(&pkg.id()) {
            match age_days(&pkgdir, now) {
                Some(age) if age < expire_days => {
                    debug!("not removing {}: {} days old, expiry is {}", pkg, age, expire_days);
                }
                _ => {
                    if remove_package(updater, tx, &pkg, &row).is_ok() {
                        removed += 1;
                    }
                }
            }
        }

        replay_triggers(updater, tx, Event::RmPackage, &pkg, &pkgdir);
        Ok(())
    })?;

    info!("removed {} packages", removed);
    Ok(())
}

/// Whole days since `dir` was last modified
///
/// `None` when the directory is missing or its timestamp unreadable; such
/// a package is treated as expired.
fn age_days(dir: &Path, now: SystemTime) -> Option<u64> {
    let modified = fs::metadata(dir).and_then(|meta| meta.modified()).ok()?;
    let age = now.duration_since(modified).map(|d| d.as_secs()).unwrap_or(0);
    Some(age / SECONDS_PER_DAY)
}

/// Remove `pkg` from every storage, notifying observers first
///
/// Observer writes and the metadata removal share one savepoint, so a
/// failure leaves the database row in place for the next run to retry.
pub(crate) fn remove_package(
    updater: &Updater,
    tx: &mut Transaction<'_>,
    pkg: &SourcePackage,
    row: &Package,
) -> Result<()> {
    info!("remove {}...", pkg);
    try_remove_package(updater, tx, pkg, row).inspect_err(|e| {
        error!("failed to remove {}: {}", pkg, e);
    })
}

fn try_remove_package(
    updater: &Updater,
    tx: &mut Transaction<'_>,
    pkg: &SourcePackage,
    row: &Package,
) -> Result<()> {
    let ctx = updater.context();
    let pkgdir = pkg
        .extraction_dir(&updater.config().sources_dir)
        .ok_or_else(|| Error::NotFoundError(format!("{} has no extraction dir", pkg)))?;

    db::nested(tx, |conn| {
        if ctx.should_write(Backend::Hooks) {
            updater
                .notifier()
                .notify(Event::RmPackage, conn, pkg, &pkgdir, None)?;
        }
        if ctx.should_write(Backend::Fs) {
            updater.storage().remove(pkg, &pkgdir)?;
        }
        if ctx.should_write(Backend::Db) {
            storage::db::remove_package(conn, pkg, row)?;
        }
        Ok(())
    })
}
