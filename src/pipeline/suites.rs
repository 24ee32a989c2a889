// src/pipeline/suites.rs

//! Suites stage: rebuild package/suite mappings from the mirror
//!
//! Each suite on the mirror is replaced wholesale: its old mappings are
//! dropped and rebuilt from the current listing. The collected entries
//! are then written to `sources.txt`.

use super::{BULK_FLUSH_THRESHOLD, UpdateStatus, Updater, for_each_item, releases};
use crate::context::Backend;
use crate::db::models::{Package, SuiteInfo, SuiteMapping};
use crate::error::Result;
use crate::mirror::{MirrorView, PackageId};
use crate::storage::write_atomic;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::io::Write;
use tracing::{debug, info, warn};

pub fn run(
    updater: &Updater,
    conn: &mut Connection,
    mirror: &dyn MirrorView,
    status: &mut UpdateStatus,
) -> Result<()> {
    info!("update suites mappings...");
    let config = updater.config();

    for_each_item(
        conn,
        config.single_transaction,
        mirror.suites(),
        |tx, (suite, ids)| update_suite(updater, tx, suite, ids, status),
    )?;

    if updater.context().should_write(Backend::Fs) {
        updater.ensure_cache_dir()?;
        let path = config.manifest_path();
        write_atomic(&path, |out| {
            for line in status.manifest_lines() {
                writeln!(out, "{line}")?;
            }
            Ok(())
        })?;
        info!("wrote {} entries to {}", status.sources.len(), path.display());
    }
    Ok(())
}

fn update_suite(
    updater: &Updater,
    conn: &Connection,
    suite: &str,
    ids: &BTreeSet<PackageId>,
    status: &mut UpdateStatus,
) -> Result<()> {
    info!("update suite {}...", suite);
    let write_db = updater.context().should_write(Backend::Db);

    if write_db {
        let dropped = SuiteMapping::delete_suite(conn, suite)?;
        debug!("dropped {} old mappings of {}", dropped, suite);
    }

    let mut pending: Vec<(i64, String)> = Vec::new();
    for id in ids {
        let Some(package_id) = Package::find(conn, &id.name, &id.version)?.and_then(|p| p.id)
        else {
            warn!("missing package {} in suite {}, skipping", id, suite);
            continue;
        };

        pending.push((package_id, suite.to_string()));
        if !status.add_suite(id, suite) {
            warn!("package {} in suite {} has no sources entry", id, suite);
        }
        if pending.len() >= BULK_FLUSH_THRESHOLD {
            flush(conn, &mut pending, write_db)?;
        }
    }
    flush(conn, &mut pending, write_db)?;

    if write_db {
        SuiteInfo::delete(conn, suite)?;
        add_suite_info(conn, suite, false)?;
    }
    Ok(())
}

fn flush(conn: &Connection, pending: &mut Vec<(i64, String)>, write_db: bool) -> Result<()> {
    if write_db && !pending.is_empty() {
        let inserted = SuiteMapping::insert_batch(conn, pending)?;
        debug!("inserted {} suite mappings", inserted);
    }
    pending.clear();
    Ok(())
}

/// Insert the info row of `suite`, with release data when it is known
pub(crate) fn add_suite_info(conn: &Connection, suite: &str, sticky: bool) -> Result<()> {
    let mut info = SuiteInfo::new(suite.to_string(), sticky);
    if let Some(release) = releases::lookup(suite) {
        info.version = Some(release.version.to_string());
        info.release_date = Some(release.date.to_string());
    }
    info.insert(conn)
}
