// src/db/models/suite.rs

//! Suite models - package/suite membership and static suite information

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// A mapping between a stored package and a distribution suite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteMapping {
    pub id: Option<i64>,
    pub package_id: i64,
    pub suite: String,
}

impl SuiteMapping {
    /// Create a new SuiteMapping
    pub fn new(package_id: i64, suite: String) -> Self {
        Self {
            id: None,
            package_id,
            suite,
        }
    }

    /// Insert this mapping into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO suites (package_id, suite) VALUES (?1, ?2)",
            params![self.package_id, &self.suite],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Insert many `(package_id, suite)` rows with a single prepared statement
    pub fn insert_batch(conn: &Connection, rows: &[(i64, String)]) -> Result<usize> {
        let mut stmt = conn.prepare_cached("INSERT INTO suites (package_id, suite) VALUES (?1, ?2)")?;
        for (package_id, suite) in rows {
            stmt.execute(params![package_id, suite])?;
        }
        Ok(rows.len())
    }

    /// Delete every mapping for `suite`, returning how many were removed
    pub fn delete_suite(conn: &Connection, suite: &str) -> Result<usize> {
        let deleted = conn.execute("DELETE FROM suites WHERE suite = ?1", [suite])?;
        Ok(deleted)
    }

    /// Delete a single mapping
    pub fn delete(conn: &Connection, package_id: i64, suite: &str) -> Result<()> {
        conn.execute(
            "DELETE FROM suites WHERE package_id = ?1 AND suite = ?2",
            params![package_id, suite],
        )?;
        Ok(())
    }

    /// Look up the mapping between `package_id` and `suite`
    pub fn find(conn: &Connection, package_id: i64, suite: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, package_id, suite FROM suites WHERE package_id = ?1 AND suite = ?2",
        )?;

        let mapping = stmt
            .query_row(params![package_id, suite], Self::from_row)
            .optional()?;

        Ok(mapping)
    }

    /// All suites a package belongs to, sorted
    pub fn suites_of(conn: &Connection, package_id: i64) -> Result<Vec<String>> {
        let mut stmt =
            conn.prepare("SELECT suite FROM suites WHERE package_id = ?1 ORDER BY suite")?;

        let suites = stmt
            .query_map([package_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(suites)
    }

    /// `(name, version)` pairs currently mapped to `suite`, sorted
    pub fn packages_in(conn: &Connection, suite: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = conn.prepare(
            "SELECT n.name, p.version
             FROM suites s
             JOIN packages p ON s.package_id = p.id
             JOIN package_names n ON p.name_id = n.id
             WHERE s.suite = ?1
             ORDER BY n.name, p.version",
        )?;

        let packages = stmt
            .query_map([suite], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(packages)
    }

    /// Distinct suite names with at least one mapping, sorted
    pub fn distinct_suites(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT DISTINCT suite FROM suites ORDER BY suite")?;

        let suites = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(suites)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            package_id: row.get(1)?,
            suite: row.get(2)?,
        })
    }
}

/// Static information about a known suite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteInfo {
    pub name: String,
    pub version: Option<String>,
    /// ISO date (YYYY-MM-DD)
    pub release_date: Option<String>,
    pub sticky: bool,
}

impl SuiteInfo {
    /// Create a new SuiteInfo
    pub fn new(name: String, sticky: bool) -> Self {
        Self {
            name,
            version: None,
            release_date: None,
            sticky,
        }
    }

    /// Insert this suite info row
    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO suites_info (name, version, release_date, sticky) VALUES (?1, ?2, ?3, ?4)",
            params![&self.name, &self.version, &self.release_date, self.sticky],
        )?;
        Ok(())
    }

    /// Find suite info by name
    pub fn find(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT name, version, release_date, sticky FROM suites_info WHERE name = ?1",
        )?;
        let info = stmt.query_row([name], Self::from_row).optional()?;
        Ok(info)
    }

    /// Delete the info row for `name`
    pub fn delete(conn: &Connection, name: &str) -> Result<()> {
        conn.execute("DELETE FROM suites_info WHERE name = ?1", [name])?;
        Ok(())
    }

    /// Names of sticky suites, sorted
    pub fn sticky_suites(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt =
            conn.prepare("SELECT name FROM suites_info WHERE sticky = 1 ORDER BY name")?;

        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(names)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            version: row.get(1)?,
            release_date: row.get(2)?,
            sticky: row.get(3)?,
        })
    }
}
