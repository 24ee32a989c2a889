// src/commands/mod.rs
//! Command handlers for the srcmirror CLI

mod archive;
mod init;
mod update;

pub use archive::{cmd_archive_add, cmd_archive_list, cmd_archive_remove};
pub use init::cmd_init;
pub use update::{UpdateOverrides, cmd_update};

use anyhow::{Context, Result};
use rusqlite::Connection;
use srcmirror::Config;

/// Open the database named by `config`
pub(crate) fn open_db(config: &Config) -> Result<Connection> {
    let db_path = config.db_path.to_string_lossy();
    srcmirror::db::open(&db_path).with_context(|| format!("cannot open database {}", db_path))
}
