// src/cli/archive.rs
//! Sticky suite commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum ArchiveCommands {
    /// List suites on the archive mirror and sticky suites in the database
    List,

    /// Add a suite from the archive mirror as a sticky suite
    Add {
        /// Suite name (e.g. hamm)
        suite: String,
    },

    /// Remove a sticky suite and the packages only it references
    Remove {
        /// Suite name
        suite: String,
    },
}
