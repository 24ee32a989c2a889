// src/context.rs

//! Capability-gated execution context
//!
//! Stages never look at `dry_run` or the backend list directly; they ask
//! the context whether a given backend may be written to.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A storage backend an update run may write to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Filesystem storage (extracted sources, cache files)
    Fs,
    /// Database storage (package metadata, suite mappings, history)
    Db,
    /// Notification of hooks and observers
    Hooks,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Fs, Backend::Db, Backend::Hooks];

    pub fn as_str(&self) -> &str {
        match self {
            Backend::Fs => "fs",
            Backend::Db => "db",
            Backend::Hooks => "hooks",
        }
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fs" => Ok(Backend::Fs),
            "db" => Ok(Backend::Db),
            "hooks" => Ok(Backend::Hooks),
            _ => Err(Error::ConfigError(format!("unknown backend: {s}"))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an update run is allowed to touch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecContext {
    dry_run: bool,
    backends: BTreeSet<Backend>,
}

impl ExecContext {
    pub fn new(dry_run: bool, backends: impl IntoIterator<Item = Backend>) -> Self {
        Self {
            dry_run,
            backends: backends.into_iter().collect(),
        }
    }

    /// All backends enabled, not a dry run
    pub fn full() -> Self {
        Self::new(false, Backend::ALL)
    }

    /// Whether writes to `backend` should actually happen
    pub fn should_write(&self, backend: Backend) -> bool {
        !self.dry_run && self.backends.contains(&backend)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn backends(&self) -> &BTreeSet<Backend> {
        &self.backends
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::full()
    }
}
