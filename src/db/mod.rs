// src/db/mod.rs

//! Database layer for srcmirror
//!
//! One SQLite connection is opened per update run and shared by every
//! stage. Stage-level work runs inside [`transaction`]; per-package work
//! runs inside a `rusqlite::Savepoint` taken from that transaction, so a
//! failing package only undoes its own rows.

pub mod models;
pub mod schema;

use crate::error::Result;
use rusqlite::{Connection, Transaction};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// How long a writer waits for a competing lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Create (if needed) and migrate the database at `db_path`
pub fn init(db_path: &str) -> Result<()> {
    info!("Initializing database at {}", db_path);

    if let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let conn = open(db_path)?;
    schema::migrate(&conn)?;
    Ok(())
}

/// Open a connection to the database at `db_path`
///
/// Pending migrations are applied, so a freshly created file is usable
/// right away.
pub fn open(db_path: &str) -> Result<Connection> {
    debug!("Opening database {}", db_path);
    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    Ok(conn)
}

/// Open an in-memory database with the full schema (used by tests and dry runs)
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    // journal_mode returns the resulting mode as a row
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    Ok(())
}

/// Run `f` inside a transaction, committing on `Ok` and rolling back on `Err`
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&mut Transaction<'_>) -> Result<T>,
{
    let mut tx = conn.transaction()?;
    let value = f(&mut tx)?;
    tx.commit()?;
    Ok(value)
}

/// Run `f` inside a savepoint of `tx`
///
/// The savepoint is released on `Ok`. On `Err` it is dropped, which rolls
/// back everything `f` wrote while leaving the enclosing transaction usable.
pub fn nested<T, F>(tx: &mut Transaction<'_>, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    let sp = tx.savepoint()?;
    let value = f(&*sp)?;
    sp.commit()?;
    Ok(value)
}
