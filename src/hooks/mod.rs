// src/hooks/mod.rs

//! Notification of package lifecycle events
//!
//! Two channels receive every event:
//!
//! - external hook programs (see [`runparts`]), run first
//! - in-process [`Observer`]s, registered once at startup in an
//!   [`ObserverRegistry`] and called in registration order
//!
//! A failure on either channel is logged and returned; callers decide
//! whether it is fatal (the pipeline treats it as a per-package failure).

pub mod runparts;

use crate::error::{Error, Result};
use crate::mirror::SourcePackage;
use crate::storage::FileTable;
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

/// Package lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Event {
    AddPackage,
    RmPackage,
}

impl Event {
    pub const ALL: [Event; 2] = [Event::AddPackage, Event::RmPackage];

    pub fn as_str(&self) -> &str {
        match self {
            Event::AddPackage => "add-package",
            Event::RmPackage => "rm-package",
        }
    }
}

impl FromStr for Event {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "add-package" => Ok(Event::AddPackage),
            "rm-package" => Ok(Event::RmPackage),
            _ => Err(Error::ConfigError(format!("unknown event: {s}"))),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An in-process subscriber to package events
pub trait Observer {
    /// Name used in logs and to select the observer for forced replay
    fn title(&self) -> &str;

    /// Handle `event` for `pkg`, extracted at `pkgdir`
    ///
    /// `file_table` is available right after an add; it is `None` on
    /// removal and on forced replay of an already stored package.
    fn notify(
        &self,
        conn: &Connection,
        event: Event,
        pkg: &SourcePackage,
        pkgdir: &Path,
        file_table: Option<&FileTable>,
    ) -> Result<()>;
}

/// Observers by event, in registration order
#[derive(Default)]
pub struct ObserverRegistry {
    observers: BTreeMap<Event, Vec<Box<dyn Observer>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, event: Event, observer: Box<dyn Observer>) {
        debug!("Subscribing observer {} to {}", observer.title(), event);
        self.observers.entry(event).or_default().push(observer);
    }

    pub fn observers(&self, event: Event) -> &[Box<dyn Observer>] {
        match self.observers.get(&event) {
            Some(observers) => observers,
            None => &[],
        }
    }

    /// Titles subscribed to `event`, in call order
    pub fn titles(&self, event: Event) -> Vec<&str> {
        self.observers(event).iter().map(|o| o.title()).collect()
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for event in Event::ALL {
            map.entry(&event.as_str(), &self.titles(event));
        }
        map.finish()
    }
}

/// `(event, observer title)` pairs selected for forced replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerSet {
    triggers: BTreeSet<(Event, String)>,
}

impl TriggerSet {
    /// Parse `event/title` strings
    pub fn parse(specs: &[String]) -> Result<Self> {
        let mut set = Self::default();
        for spec in specs {
            let (event, title) = spec.split_once('/').ok_or_else(|| {
                Error::ConfigError(format!("invalid trigger '{spec}', expected event/title"))
            })?;
            if title.is_empty() {
                return Err(Error::ConfigError(format!(
                    "invalid trigger '{spec}', missing observer title"
                )));
            }
            set.insert(event.parse()?, title);
        }
        Ok(set)
    }

    pub fn insert(&mut self, event: Event, title: &str) {
        self.triggers.insert((event, title.to_string()));
    }

    pub fn contains(&self, event: Event, title: &str) -> bool {
        self.triggers.contains(&(event, title.to_string()))
    }

    /// Whether any trigger is registered for `event`
    pub fn has_event(&self, event: Event) -> bool {
        self.triggers.iter().any(|(e, _)| *e == event)
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

/// Dispatches package events to hook programs and observers
#[derive(Debug)]
pub struct Notifier {
    bin_dir: PathBuf,
    registry: ObserverRegistry,
    timeout: Option<Duration>,
}

impl Notifier {
    pub fn new(bin_dir: &Path, registry: ObserverRegistry) -> Self {
        Self {
            bin_dir: bin_dir.to_path_buf(),
            registry,
            timeout: None,
        }
    }

    /// Bound each hook program's run time
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ObserverRegistry {
        &self.registry
    }

    /// Directory holding the hook programs for `event`
    pub fn hook_dir(&self, event: Event) -> PathBuf {
        self.bin_dir.join(format!("{}.d", event.as_str()))
    }

    /// Notify both channels of `event`
    ///
    /// Callers only invoke this when the hooks backend is writable.
    pub fn notify(
        &self,
        event: Event,
        conn: &Connection,
        pkg: &SourcePackage,
        pkgdir: &Path,
        file_table: Option<&FileTable>,
    ) -> Result<()> {
        self.run_hooks(event, pkg, pkgdir)?;
        self.notify_observers(event, conn, pkg, pkgdir, file_table, None, false)
    }

    /// Run the external hook programs for `event`
    pub fn run_hooks(&self, event: Event, pkg: &SourcePackage, pkgdir: &Path) -> Result<()> {
        let dir_arg = pkgdir.to_string_lossy();
        let args = [dir_arg.as_ref(), pkg.name.as_str(), pkg.version.as_str()];

        runparts::run_parts(&self.hook_dir(event), &args, self.timeout).inspect_err(|e| {
            error!("{} hooks failed for {}: {}", event, pkg, e);
        })
    }

    /// Call observers subscribed to `event`
    ///
    /// Without `triggers` every observer runs. With `triggers` only the
    /// observers named for this event run, and only outside dry-run mode.
    #[allow(clippy::too_many_arguments)]
    pub fn notify_observers(
        &self,
        event: Event,
        conn: &Connection,
        pkg: &SourcePackage,
        pkgdir: &Path,
        file_table: Option<&FileTable>,
        triggers: Option<&TriggerSet>,
        dry_run: bool,
    ) -> Result<()> {
        for observer in self.registry.observers(event) {
            let title = observer.title();

            if let Some(triggers) = triggers {
                if !triggers.contains(event, title) {
                    continue;
                }
                info!("Trigger {}/{} on {}", event, title, pkg);
                if dry_run {
                    continue;
                }
            }

            observer
                .notify(conn, event, pkg, pkgdir, file_table)
                .map_err(|e| {
                    error!("Observer {}/{} failed on {}: {}", event, title, pkg, e);
                    Error::ObserverError(format!("{}/{} on {}: {}", event, title, pkg, e))
                })?;
        }
        Ok(())
    }
}
