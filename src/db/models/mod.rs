// src/db/models/mod.rs

//! Data models for srcmirror database entities
//!
//! Each struct corresponds to a table and exposes associated functions
//! for creating, reading and deleting rows over a `&Connection`, so the
//! same code runs against a plain connection, a transaction or a savepoint.

mod derived;
mod file_entry;
mod history;
mod package;
mod suite;

pub use derived::{Checksum, Ctag, METRIC_SIZE, Metric, SlocCount};
pub use file_entry::SourceFile;
pub use history::{
    ALL_SUITES, HistorySize, HistorySlocCount, TIMESTAMP_FORMAT, format_timestamp,
};
pub use package::Package;
pub use suite::{SuiteInfo, SuiteMapping};
