// src/db/models/file_entry.rs

//! SourceFile model - files belonging to an extracted source package

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// A file inside a package's extraction directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub id: Option<i64>,
    pub package_id: i64,
    /// Path relative to the extraction directory
    pub path: String,
}

impl SourceFile {
    /// Create a new SourceFile
    pub fn new(package_id: i64, path: String) -> Self {
        Self {
            id: None,
            package_id,
            path,
        }
    }

    /// Insert this file into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO files (package_id, path) VALUES (?1, ?2)",
            params![self.package_id, &self.path],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a file by package and relative path
    pub fn find(conn: &Connection, package_id: i64, path: &str) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare("SELECT id, package_id, path FROM files WHERE package_id = ?1 AND path = ?2")?;

        let file = stmt
            .query_row(params![package_id, path], Self::from_row)
            .optional()?;

        Ok(file)
    }

    /// Find all files belonging to a package, ordered by path
    pub fn find_by_package(conn: &Connection, package_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn
            .prepare("SELECT id, package_id, path FROM files WHERE package_id = ?1 ORDER BY path")?;

        let files = stmt
            .query_map([package_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(files)
    }

    /// Delete a file by ID
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM files WHERE id = ?1", [id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            package_id: row.get(1)?,
            path: row.get(2)?,
        })
    }
}
