// src/cli/mod.rs
//! CLI definitions for srcmirror
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! - `init` - Create the metadata database
//! - `update` - Run the update pipeline against the mirror
//! - `archive` - Manage sticky suites from the archive mirror

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

mod archive;

pub use archive::ArchiveCommands;

#[derive(Parser)]
#[command(name = "srcmirror")]
#[command(author = "srcmirror Contributors")]
#[command(version)]
#[command(about = "Keep an extracted source package mirror in sync with an archive", long_about = None)]
pub struct Cli {
    /// Configuration file (default: /etc/srcmirror/config.toml, then ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the metadata database and apply schema migrations
    Init,

    /// Bring extracted sources, metadata and statistics up to date
    Update {
        /// Only run this stage: extract, suites, gc, stats, cache, charts (repeatable)
        #[arg(long = "stage", value_name = "STAGE")]
        stages: Vec<String>,

        /// Only write to this backend: fs, db, hooks, or none (repeatable)
        #[arg(short, long = "backend", value_name = "BACKEND")]
        backends: Vec<String>,

        /// Show what would be done without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Re-run an observer on every package, as event/title (repeatable)
        #[arg(long = "force-trigger", value_name = "EVENT/TITLE")]
        force_triggers: Vec<String>,

        /// One transaction per stage (yes) or per package (no)
        #[arg(long, value_name = "yes|no")]
        single_transaction: Option<String>,
    },

    /// Sticky suites from the archive mirror
    #[command(subcommand)]
    Archive(ArchiveCommands),
}
