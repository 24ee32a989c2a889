// src/lib.rs

//! srcmirror
//!
//! Keeps an extracted mirror of source packages, its metadata database
//! and derived statistics in sync with an upstream archive mirror.
//!
//! # Architecture
//!
//! - Pipeline: fixed-order stages (extract, suites, gc, stats, cache,
//!   charts) driven by [`pipeline::Updater`]
//! - Two storages: extracted trees on disk and rows in SQLite, written in
//!   an order that makes every stage safe to rerun after a crash
//! - Database rows are the completion marker: a package with a row was
//!   fully added
//! - Observers and external hook programs are notified on package
//!   addition and removal
//! - Sticky suites (archived releases) are exempt from garbage collection

pub mod archive;
pub mod charts;
pub mod config;
pub mod context;
pub mod db;
mod error;
pub mod hooks;
pub mod mirror;
pub mod observers;
pub mod pipeline;
pub mod statistics;
pub mod storage;

pub use config::Config;
pub use context::{Backend, ExecContext};
pub use error::{Error, Result};
pub use hooks::{Event, Notifier, Observer, ObserverRegistry, TriggerSet};
pub use mirror::{MirrorView, PackageId, SourceMirror, SourcePackage};
pub use pipeline::{Stage, UpdateStatus, Updater};
