// src/db/models/package.rs

//! Package model - a versioned source package and its name row

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

const SELECT_PACKAGE: &str = "SELECT p.id, n.name, p.version, p.area, p.sticky, p.added_at
     FROM packages p JOIN package_names n ON p.name_id = n.id";

/// A stored source package version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
    /// Archive area (main, contrib, non-free, ...)
    pub area: String,
    /// Sticky packages are exempt from garbage collection
    pub sticky: bool,
    pub added_at: Option<String>,
}

impl Package {
    /// Create a new Package
    pub fn new(name: String, version: String, area: String) -> Self {
        Self {
            id: None,
            name,
            version,
            area,
            sticky: false,
            added_at: None,
        }
    }

    /// Insert this package, creating its name row if needed
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let name_id = ensure_name(conn, &self.name)?;

        conn.execute(
            "INSERT INTO packages (name_id, version, area, sticky) VALUES (?1, ?2, ?3, ?4)",
            params![name_id, &self.version, &self.area, self.sticky],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a package by its `(name, version)` identity
    pub fn find(conn: &Connection, name: &str, version: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_PACKAGE} WHERE n.name = ?1 AND p.version = ?2"
        ))?;

        let package = stmt
            .query_row(params![name, version], Self::from_row)
            .optional()?;

        Ok(package)
    }

    /// Find a package by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("{SELECT_PACKAGE} WHERE p.id = ?1"))?;
        let package = stmt.query_row([id], Self::from_row).optional()?;
        Ok(package)
    }

    /// List all packages, ordered by name and version
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!("{SELECT_PACKAGE} ORDER BY n.name, p.version"))?;

        let packages = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(packages)
    }

    /// List packages that garbage collection may consider
    pub fn list_non_sticky(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_PACKAGE} WHERE p.sticky = 0 ORDER BY n.name, p.version"
        ))?;

        let packages = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(packages)
    }

    /// List sticky packages mapped to `suite`
    pub fn list_sticky_in_suite(conn: &Connection, suite: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_PACKAGE} JOIN suites s ON s.package_id = p.id
             WHERE s.suite = ?1 AND p.sticky = 1
             ORDER BY n.name, p.version"
        ))?;

        let packages = stmt
            .query_map([suite], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(packages)
    }

    /// Set or clear the sticky flag
    pub fn set_sticky(conn: &Connection, id: i64, sticky: bool) -> Result<()> {
        conn.execute(
            "UPDATE packages SET sticky = ?1 WHERE id = ?2",
            params![sticky, id],
        )?;
        Ok(())
    }

    /// Delete a package by ID
    ///
    /// Dependent rows go with it (ON DELETE CASCADE). The name row is
    /// dropped once no version references it any more.
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        let name_id: Option<i64> = conn
            .query_row("SELECT name_id FROM packages WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;

        conn.execute("DELETE FROM packages WHERE id = ?1", [id])?;

        if let Some(name_id) = name_id {
            conn.execute(
                "DELETE FROM package_names
                 WHERE id = ?1 AND NOT EXISTS (SELECT 1 FROM packages WHERE name_id = ?1)",
                [name_id],
            )?;
        }

        Ok(())
    }

    /// List all distinct package names, sorted
    pub fn list_names(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT name FROM package_names ORDER BY name")?;

        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(names)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            version: row.get(2)?,
            area: row.get(3)?,
            sticky: row.get(4)?,
            added_at: row.get(5)?,
        })
    }
}

/// Return the ID of the name row for `name`, inserting it if missing
fn ensure_name(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO package_names (name) VALUES (?1)",
        [name],
    )?;

    let id = conn.query_row(
        "SELECT id FROM package_names WHERE name = ?1",
        [name],
        |row| row.get(0),
    )?;

    Ok(id)
}
