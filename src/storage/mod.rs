// src/storage/mod.rs

//! Storage adapters
//!
//! Two backends hold a package: the filesystem (its extracted sources) and
//! the database (its metadata rows). They cannot be updated atomically
//! together; the database row is the completion marker, so the filesystem
//! side is always written first on add and removed first on remove.

pub mod db;
pub mod exclude;
pub mod fs;

pub use fs::{DpkgSource, FsStorage, write_atomic};

use std::collections::BTreeMap;

/// Relative file path to database file ID, produced when a package is added
pub type FileTable = BTreeMap<String, i64>;
