// src/pipeline/cache.rs

//! Cache stage: small files read by the web front end

use super::Updater;
use crate::context::Backend;
use crate::error::Result;
use crate::storage::{self, write_atomic};
use chrono::Utc;
use rusqlite::Connection;
use std::io::Write;
use tracing::{debug, info};

/// Sorted package name prefixes, one per line
pub const PREFIXES_FILE: &str = "pkg-prefixes";

/// RFC 2822 timestamp of the last completed cache refresh
pub const LAST_UPDATE_FILE: &str = "last-update";

pub fn run(updater: &Updater, conn: &Connection) -> Result<()> {
    info!("update cached info...");
    if !updater.context().should_write(Backend::Fs) {
        debug!("filesystem backend disabled, not writing cache files");
        return Ok(());
    }
    updater.ensure_cache_dir()?;
    let cache_dir = &updater.config().cache_dir;

    let prefixes = storage::db::list_prefixes(conn)?;
    write_atomic(&cache_dir.join(PREFIXES_FILE), |out| {
        for prefix in &prefixes {
            writeln!(out, "{prefix}")?;
        }
        Ok(())
    })?;
    debug!("wrote {} package prefixes", prefixes.len());

    let now = Utc::now().to_rfc2822();
    write_atomic(&cache_dir.join(LAST_UPDATE_FILE), |out| writeln!(out, "{now}"))?;
    Ok(())
}
