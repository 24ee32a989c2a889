// src/pipeline/mod.rs

//! The update pipeline
//!
//! A run scans the mirror once and then executes the requested stages,
//! always in this order:
//!
//! 1. [`extract`]: add packages new on the mirror
//! 2. [`suites`]: rebuild suite mappings and write `sources.txt`
//! 3. [`gc`]: remove expired packages gone from the mirror
//! 4. [`stats`]: refresh the statistics cache and history
//! 5. [`cache`]: write `pkg-prefixes` and `last-update`
//! 6. [`charts`]: render history charts
//!
//! Per-package failures are logged and skipped; the package is left as it
//! was, so the next run retries it. Anything else aborts the run.

pub mod cache;
pub mod charts;
pub mod extract;
pub mod gc;
pub mod lock;
pub mod releases;
pub mod stats;
pub mod suites;

pub use lock::UpdateLock;

use crate::charts::{ChartRenderer, SvgRenderer};
use crate::config::Config;
use crate::context::{Backend, ExecContext};
use crate::db;
use crate::error::{Error, Result};
use crate::hooks::{Event, Notifier, TriggerSet};
use crate::mirror::{MirrorView, PackageId, SourceMirror, SourcePackage};
use crate::observers;
use crate::storage::exclude::ExcludeSpec;
use crate::storage::{DpkgSource, FsStorage};
use rusqlite::{Connection, Transaction};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{error, info};

/// Maximum number of pending suite-mapping rows before a bulk insert
pub const BULK_FLUSH_THRESHOLD: usize = 50_000;

/// One phase of an update run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Extract,
    Suites,
    Gc,
    Stats,
    Cache,
    Charts,
}

impl Stage {
    /// Every stage, in execution order
    pub const ALL: [Stage; 6] = [
        Stage::Extract,
        Stage::Suites,
        Stage::Gc,
        Stage::Stats,
        Stage::Cache,
        Stage::Charts,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Stage::Extract => "extract",
            Stage::Suites => "suites",
            Stage::Gc => "gc",
            Stage::Stats => "stats",
            Stage::Cache => "cache",
            Stage::Charts => "charts",
        }
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| Error::ConfigError(format!("unknown update stage: {s}")))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `sources.txt` entry for a package seen during this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub area: String,
    /// `.dsc` path relative to the mirror root
    pub dsc_rel: String,
    /// Extraction directory relative to `sources_dir`
    pub extraction_rel: String,
    /// Filled in by the suites stage
    pub suites: Vec<String>,
}

/// State carried from stage to stage within one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateStatus {
    pub sources: BTreeMap<PackageId, SourceEntry>,
}

impl UpdateStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: PackageId, entry: SourceEntry) {
        self.sources.insert(id, entry);
    }

    /// Append `suite` to the entry of `id`; `false` if there is no entry
    pub fn add_suite(&mut self, id: &PackageId, suite: &str) -> bool {
        match self.sources.get_mut(id) {
            Some(entry) => {
                entry.suites.push(suite.to_string());
                true
            }
            None => false,
        }
    }

    /// `sources.txt` lines, sorted by package identity
    pub fn manifest_lines(&self) -> impl Iterator<Item = String> + '_ {
        self.sources.iter().map(|(id, entry)| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                id.name,
                id.version,
                entry.area,
                entry.dsc_rel,
                entry.extraction_rel,
                entry.suites.join(",")
            )
        })
    }
}

/// Runs update stages against one database session
pub struct Updater {
    config: Config,
    ctx: ExecContext,
    notifier: Notifier,
    storage: Box<dyn FsStorage>,
    renderer: Box<dyn ChartRenderer>,
    triggers: TriggerSet,
    exclude: Vec<ExcludeSpec>,
}

impl Updater {
    /// Build an updater with the collaborators named by `config`
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let registry = observers::load(&config)?;
        let notifier = Notifier::new(&config.bin_dir, registry).with_timeout(config.hook_timeout());

        Ok(Self {
            ctx: config.exec_context(),
            storage: Box::new(DpkgSource::new(&config.sources_dir)),
            renderer: Box::new(SvgRenderer::new()),
            triggers: config.triggers()?,
            exclude: config.exclude_specs()?,
            notifier,
            config,
        })
    }

    /// Replace the filesystem storage (extraction) backend
    pub fn with_storage(mut self, storage: impl FsStorage + 'static) -> Self {
        self.storage = Box::new(storage);
        self
    }

    pub fn with_renderer(mut self, renderer: impl ChartRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_exclude(mut self, exclude: Vec<ExcludeSpec>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &ExecContext {
        &self.ctx
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn storage(&self) -> &dyn FsStorage {
        self.storage.as_ref()
    }

    pub fn renderer(&self) -> &dyn ChartRenderer {
        self.renderer.as_ref()
    }

    pub fn triggers(&self) -> &TriggerSet {
        &self.triggers
    }

    pub fn exclude(&self) -> &[ExcludeSpec] {
        &self.exclude
    }

    /// Take the run lock in the cache directory
    pub fn lock(&self) -> Result<UpdateLock> {
        UpdateLock::try_acquire(&self.config.lock_path())
    }

    /// Scan the configured mirror and run `stages`
    pub fn run(&self, conn: &mut Connection, stages: &[Stage]) -> Result<UpdateStatus> {
        let _lock = self.lock()?;
        info!("list mirror packages...");
        let mirror = SourceMirror::scan(&self.config.mirror_dir)?;
        self.run_with_mirror(conn, &mirror, stages)
    }

    /// Run `stages` in their fixed order against an already listed mirror
    pub fn run_with_mirror(
        &self,
        conn: &mut Connection,
        mirror: &dyn MirrorView,
        stages: &[Stage],
    ) -> Result<UpdateStatus> {
        info!("start");
        let mut status = UpdateStatus::new();

        for stage in Stage::ALL {
            if !stages.contains(&stage) {
                continue;
            }
            match stage {
                Stage::Extract => extract::run(self, conn, mirror, &mut status)?,
                Stage::Suites => suites::run(self, conn, mirror, &mut status)?,
                Stage::Gc => gc::run(self, conn, mirror)?,
                Stage::Stats => {
                    stats::run(self, conn, None)?;
                }
                Stage::Cache => cache::run(self, conn)?,
                Stage::Charts => charts::run(self, conn, None)?,
            }
        }

        info!("finish");
        Ok(status)
    }

    /// Create the cache directory, if the filesystem may be written
    pub(crate) fn ensure_cache_dir(&self) -> Result<()> {
        ensure_dir(&self.config.cache_dir, &self.ctx)
    }
}

pub(crate) fn ensure_dir(dir: &Path, ctx: &ExecContext) -> Result<()> {
    if ctx.should_write(Backend::Fs) && !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Replay the forced observer triggers of `event` on `pkg`
///
/// Observer writes are confined to a savepoint; a failure is logged and
/// rolled back without affecting the rest of the run.
pub(crate) fn replay_triggers(
    updater: &Updater,
    tx: &mut Transaction<'_>,
    event: Event,
    pkg: &SourcePackage,
    pkgdir: &Path,
) {
    let triggers = updater.triggers();
    if !triggers.has_event(event) {
        return;
    }

    let dry_run = updater.context().is_dry_run();
    let result = db::nested(tx, |conn| {
        updater
            .notifier()
            .notify_observers(event, conn, pkg, pkgdir, None, Some(triggers), dry_run)
    });
    if let Err(e) = result {
        error!("trigger failure on {}: {}", pkg, e);
    }
}

/// Run `work` once per item inside the configured transaction layout
///
/// With `single_transaction` every item shares one transaction; otherwise
/// each item gets its own. `work` is expected to isolate item failures
/// itself (see [`db::nested`]); an `Err` from it aborts the loop.
pub(crate) fn for_each_item<T, I, F>(
    conn: &mut Connection,
    single_transaction: bool,
    items: I,
    mut work: F,
) -> Result<()>
where
    I: IntoIterator<Item = T>,
    F: FnMut(&mut Transaction<'_>, T) -> Result<()>,
{
    if single_transaction {
        return db::transaction(conn, |tx| {
            for item in items {
                work(tx, item)?;
            }
            Ok(())
        });
    }

    for item in items {
        db::transaction(conn, |tx| work(tx, item))?;
    }
    Ok(())
}
