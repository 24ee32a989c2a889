// src/observers/metrics.rs

//! Per-package metrics (disk usage)

use crate::db::models::{METRIC_SIZE, Metric, Package};
use crate::error::{Error, Result};
use crate::hooks::{Event, Observer};
use crate::mirror::SourcePackage;
use crate::storage::FileTable;
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

pub const TITLE: &str = "metrics";

#[derive(Debug, Clone, Default)]
pub struct MetricsObserver;

impl MetricsObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Observer for MetricsObserver {
    fn title(&self) -> &str {
        TITLE
    }

    fn notify(
        &self,
        conn: &Connection,
        event: Event,
        pkg: &SourcePackage,
        pkgdir: &Path,
        _file_table: Option<&FileTable>,
    ) -> Result<()> {
        let Some(row) = Package::find(conn, &pkg.name, &pkg.version)? else {
            return match event {
                Event::AddPackage => Err(Error::NotFoundError(format!(
                    "{} is not in the database",
                    pkg
                ))),
                Event::RmPackage => Ok(()),
            };
        };
        let package_id = row
            .id
            .ok_or_else(|| Error::NotFoundError(format!("{} has no database id", pkg)))?;

        match event {
            Event::AddPackage => {
                let size = disk_usage(pkgdir)?;
                debug!("{} uses {} bytes", pkg, size);
                Metric::new(package_id, METRIC_SIZE, size).upsert(conn)
            }
            Event::RmPackage => Metric::delete(conn, package_id, METRIC_SIZE),
        }
    }
}

/// Total size in bytes of the regular files below `dir`
///
/// A missing directory has no usage.
pub fn disk_usage(dir: &Path) -> Result<i64> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut total: u64 = 0;
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(i64::try_from(total).unwrap_or(i64::MAX))
}
