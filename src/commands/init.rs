// src/commands/init.rs
//! Database initialization

use anyhow::{Context, Result};
use srcmirror::Config;
use tracing::info;

/// Create the database and apply all migrations
pub fn cmd_init(config: &Config) -> Result<()> {
    let db_path = config.db_path.to_string_lossy();
    info!("Initializing srcmirror database at: {}", db_path);

    srcmirror::db::init(&db_path)
        .with_context(|| format!("cannot initialize database {}", db_path))?;
    println!("Database initialized successfully at: {}", db_path);
    Ok(())
}
