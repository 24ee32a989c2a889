// src/db/models/derived.rs

//! Rows that observers derive from a package's files
//!
//! - checksums: one SHA-256 per file
//! - metrics: scalar per-package measurements (disk usage, ...)
//! - sloccounts: lines of code per language
//! - ctags: symbol index entries

use crate::error::Result;
use rusqlite::{Connection, params};

/// Metric name for a package's on-disk size in bytes
pub const METRIC_SIZE: &str = "size";

/// A file checksum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    pub package_id: i64,
    pub file_id: i64,
    pub sha256: String,
}

impl Checksum {
    pub fn new(package_id: i64, file_id: i64, sha256: String) -> Self {
        Self {
            package_id,
            file_id,
            sha256,
        }
    }

    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.prepare_cached(
            "INSERT INTO checksums (package_id, file_id, sha256) VALUES (?1, ?2, ?3)",
        )?
        .execute(params![self.package_id, self.file_id, &self.sha256])?;
        Ok(())
    }

    pub fn delete_for_package(conn: &Connection, package_id: i64) -> Result<usize> {
        let deleted = conn.execute("DELETE FROM checksums WHERE package_id = ?1", [package_id])?;
        Ok(deleted)
    }

    pub fn count_for_package(conn: &Connection, package_id: i64) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM checksums WHERE package_id = ?1",
            [package_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// A scalar per-package measurement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    pub package_id: i64,
    pub metric: String,
    pub value: i64,
}

impl Metric {
    pub fn new(package_id: i64, metric: &str, value: i64) -> Self {
        Self {
            package_id,
            metric: metric.to_string(),
            value,
        }
    }

    /// Insert or replace the value for `(package_id, metric)`
    pub fn upsert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO metrics (package_id, metric, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(package_id, metric) DO UPDATE SET value = excluded.value",
            params![self.package_id, &self.metric, self.value],
        )?;
        Ok(())
    }

    pub fn find(conn: &Connection, package_id: i64, metric: &str) -> Result<Option<i64>> {
        use rusqlite::OptionalExtension;

        let value = conn
            .query_row(
                "SELECT value FROM metrics WHERE package_id = ?1 AND metric = ?2",
                params![package_id, metric],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn delete(conn: &Connection, package_id: i64, metric: &str) -> Result<()> {
        conn.execute(
            "DELETE FROM metrics WHERE package_id = ?1 AND metric = ?2",
            params![package_id, metric],
        )?;
        Ok(())
    }
}

/// Lines of code in one language for one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlocCount {
    pub package_id: i64,
    pub language: String,
    pub count: i64,
}

impl SlocCount {
    pub fn new(package_id: i64, language: &str, count: i64) -> Self {
        Self {
            package_id,
            language: language.to_string(),
            count,
        }
    }

    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO sloccounts (package_id, language, count) VALUES (?1, ?2, ?3)",
            params![self.package_id, &self.language, self.count],
        )?;
        Ok(())
    }
}

/// A symbol found by ctags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ctag {
    pub package_id: i64,
    pub file_id: i64,
    pub tag: String,
    pub line: i64,
    pub kind: Option<String>,
    pub language: Option<String>,
}

impl Ctag {
    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO ctags (package_id, file_id, tag, line, kind, language)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.package_id,
                self.file_id,
                &self.tag,
                self.line,
                &self.kind,
                &self.language,
            ],
        )?;
        Ok(())
    }
}
