// src/commands/archive.rs
//! Sticky suite commands

use super::open_db;
use anyhow::{Context, Result};
use srcmirror::{Config, SourceMirror, Updater, archive};
use tracing::info;

fn scan_archive(config: &Config) -> Result<SourceMirror> {
    let root = config.archive_mirror_dir();
    info!("list archive suites in {}...", root.display());
    SourceMirror::scan(root).with_context(|| format!("cannot read archive mirror {}", root.display()))
}

/// List archive and sticky suites
pub fn cmd_archive_list(config: &Config) -> Result<()> {
    let conn = open_db(config)?;
    let mirror = scan_archive(config)?;
    let suites = archive::list_suites(&conn, &mirror)?;

    if suites.is_empty() {
        println!("No suites found.");
        return Ok(());
    }

    println!("{:<20} {:<8} {:<8}", "SUITE", "ARCHIVE", "STICKY");
    println!("{}", "-".repeat(38));
    for (name, state) in &suites {
        let archive = if state.archive { "yes" } else { "no" };
        let sticky = if state.db { "yes" } else { "no" };
        println!("{:<20} {:<8} {:<8}", name, archive, sticky);
    }

    println!("\nTotal: {} suite(s)", suites.len());
    Ok(())
}

/// Add `suite` from the archive mirror as a sticky suite
pub fn cmd_archive_add(config: Config, suite: &str) -> Result<()> {
    config.warnings();
    let mirror = scan_archive(&config)?;
    let updater = Updater::new(config).context("invalid update configuration")?;
    let mut conn = open_db(updater.config())?;

    archive::add_suite(&updater, &mut conn, &mirror, suite)
        .with_context(|| format!("cannot add sticky suite {}", suite))?;
    println!("Added sticky suite: {}", suite);
    Ok(())
}

/// Remove the sticky suite `suite`
pub fn cmd_archive_remove(config: Config, suite: &str) -> Result<()> {
    config.warnings();
    let updater = Updater::new(config).context("invalid update configuration")?;
    let mut conn = open_db(updater.config())?;

    archive::remove_suite(&updater, &mut conn, suite)
        .with_context(|| format!("cannot remove sticky suite {}", suite))?;
    println!("Removed sticky suite: {}", suite);
    Ok(())
}
