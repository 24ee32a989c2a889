// src/db/models/history.rs

//! History models - append-only snapshots feeding the charts
//!
//! Rows are never updated or deleted. `suite = "ALL"` holds the
//! archive-wide aggregate.

use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use std::collections::BTreeMap;

/// Suite name used for aggregate history rows
pub const ALL_SUITES: &str = "ALL";

/// Storage format of history timestamps (UTC, understood by SQLite's strftime)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Format a timestamp the way history rows store it
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// A size snapshot for one suite (or the aggregate)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySize {
    pub timestamp: DateTime<Utc>,
    pub suite: String,
    pub source_packages: i64,
    pub disk_usage: i64,
    pub source_files: i64,
    pub ctags: i64,
}

impl HistorySize {
    pub fn new(suite: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            suite: suite.to_string(),
            source_packages: 0,
            disk_usage: 0,
            source_files: 0,
            ctags: 0,
        }
    }

    /// Set a size metric by name; unknown names are ignored and reported as `false`
    pub fn set(&mut self, metric: &str, value: i64) -> bool {
        match metric {
            "source_packages" => self.source_packages = value,
            "disk_usage" => self.disk_usage = value,
            "source_files" => self.source_files = value,
            "ctags" => self.ctags = value,
            _ => return false,
        }
        true
    }

    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO history_size (timestamp, suite, source_packages, disk_usage, source_files, ctags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                format_timestamp(&self.timestamp),
                &self.suite,
                self.source_packages,
                self.disk_usage,
                self.source_files,
                self.ctags,
            ],
        )?;
        Ok(())
    }

    pub fn count_for_suite(conn: &Connection, suite: &str) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM history_size WHERE suite = ?1",
            [suite],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// A per-language lines-of-code snapshot for one suite (or the aggregate)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySlocCount {
    pub timestamp: DateTime<Utc>,
    pub suite: String,
    pub counts: BTreeMap<String, i64>,
}

impl HistorySlocCount {
    pub fn new(suite: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            suite: suite.to_string(),
            counts: BTreeMap::new(),
        }
    }

    /// Insert one row per language
    pub fn insert(&self, conn: &Connection) -> Result<()> {
        let timestamp = format_timestamp(&self.timestamp);
        let mut stmt = conn.prepare_cached(
            "INSERT INTO history_sloccount (timestamp, suite, language, count) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (language, count) in &self.counts {
            stmt.execute(params![&timestamp, &self.suite, language, count])?;
        }
        Ok(())
    }
}
