// src/db/schema.rs

//! Database schema definitions and migrations
//!
//! Tables are created by numbered migrations tracked in `schema_version`.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version: Option<i32> = conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version >= SCHEMA_VERSION {
        debug!("Schema is up to date (version {})", current_version);
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!("Schema migration complete. Now at version {}", SCHEMA_VERSION);
    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::ConfigError(format!(
            "Unknown migration version: {}",
            version
        ))),
    }
}

/// Initial schema - Version 1
///
/// Package identity, suite membership, and the per-file tables that
/// observers attach derived rows to.
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE package_names (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        -- A versioned source package. sticky rows are never garbage collected.
        CREATE TABLE packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name_id INTEGER NOT NULL REFERENCES package_names(id) ON DELETE CASCADE,
            version TEXT NOT NULL,
            area TEXT NOT NULL,
            sticky INTEGER NOT NULL DEFAULT 0,
            added_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(name_id, version)
        );

        CREATE INDEX idx_packages_version ON packages(version);
        CREATE INDEX idx_packages_sticky ON packages(sticky);

        -- Suite membership, rebuilt wholesale per suite on every run
        CREATE TABLE suites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
            suite TEXT NOT NULL,
            UNIQUE(package_id, suite)
        );

        CREATE INDEX idx_suites_suite ON suites(suite);

        CREATE TABLE suites_info (
            name TEXT PRIMARY KEY,
            version TEXT,
            release_date TEXT,
            sticky INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
            path TEXT NOT NULL,
            UNIQUE(package_id, path)
        );

        CREATE TABLE checksums (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
            file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            sha256 TEXT NOT NULL,
            UNIQUE(package_id, file_id)
        );

        CREATE INDEX idx_checksums_sha256 ON checksums(sha256);

        CREATE TABLE ctags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
            file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            tag TEXT NOT NULL,
            line INTEGER NOT NULL,
            kind TEXT,
            language TEXT
        );

        CREATE INDEX idx_ctags_tag ON ctags(tag);

        CREATE TABLE sloccounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
            language TEXT NOT NULL,
            count INTEGER NOT NULL,
            UNIQUE(package_id, language)
        );

        CREATE TABLE metrics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
            metric TEXT NOT NULL,
            value INTEGER NOT NULL,
            UNIQUE(package_id, metric)
        );
        ",
    )?;

    Ok(())
}

/// Version 2: append-only history tables for chart rendering
///
/// `suite = 'ALL'` rows hold the archive-wide totals.
fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 2");

    conn.execute_batch(
        "
        CREATE TABLE history_size (
            timestamp TEXT NOT NULL,
            suite TEXT NOT NULL,
            source_packages INTEGER,
            disk_usage INTEGER,
            source_files INTEGER,
            ctags INTEGER,
            PRIMARY KEY (timestamp, suite)
        );

        CREATE INDEX idx_history_size_suite ON history_size(suite, timestamp);

        CREATE TABLE history_sloccount (
            timestamp TEXT NOT NULL,
            suite TEXT NOT NULL,
            language TEXT NOT NULL,
            count INTEGER NOT NULL,
            PRIMARY KEY (timestamp, suite, language)
        );

        CREATE INDEX idx_history_sloccount_suite ON history_sloccount(suite, timestamp);
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_fresh_database_is_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);
    }
}
