// src/config.rs

//! Update configuration
//!
//! Loaded from a TOML file, then adjusted by command-line overrides.
//!
//! ```toml
//! mirror-dir = "/srv/mirror/debian"
//! sources-dir = "/srv/srcmirror/sources"
//! cache-dir = "/srv/srcmirror/cache"
//! db-path = "/srv/srcmirror/srcmirror.db"
//! expire-days = 14
//! backends = ["fs", "db", "hooks"]
//! hooks = ["checksums", "metrics"]
//! ```

use crate::context::{Backend, ExecContext};
use crate::error::{Error, Result};
use crate::hooks::TriggerSet;
use crate::pipeline::Stage;
use crate::storage::exclude::{self, ExcludeSpec};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Config files tried, in order, when none is given explicitly
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["/etc/srcmirror/config.toml", "config.toml"];

/// Configuration for an update run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    /// Root of the local archive mirror
    pub mirror_dir: PathBuf,

    /// Mirror of archived releases, used by `archive add` (defaults to `mirror-dir`)
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,

    /// Where source packages are extracted
    pub sources_dir: PathBuf,

    /// Where derived files (manifest, stats, charts) are written
    pub cache_dir: PathBuf,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Root of external hook directories (`<bin-dir>/<event>.d/`)
    #[serde(default = "default_bin_dir")]
    pub bin_dir: PathBuf,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_backends")]
    pub backends: Vec<Backend>,

    #[serde(default = "default_stages")]
    pub stages: Vec<Stage>,

    /// One transaction for a whole stage (faster) instead of one per package
    #[serde(default = "default_single_transaction")]
    pub single_transaction: bool,

    /// Grace period before a package gone from the mirror is removed
    #[serde(default = "default_expire_days")]
    pub expire_days: u32,

    /// File exclusion specs (RFC-822 paragraphs with Package/Files fields)
    #[serde(default)]
    pub exclude_file: Option<PathBuf>,

    /// Observers to re-run regardless of package state, as `event/title`
    #[serde(default)]
    pub force_triggers: Vec<String>,

    /// In-process observers to enable, in notification order
    #[serde(default = "default_hooks")]
    pub hooks: Vec<String>,

    /// Upper bound in seconds for each external hook program
    #[serde(default)]
    pub hook_timeout: Option<u64>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/srcmirror/srcmirror.db")
}

fn default_bin_dir() -> PathBuf {
    PathBuf::from("/usr/lib/srcmirror/hooks")
}

fn default_backends() -> Vec<Backend> {
    Backend::ALL.to_vec()
}

fn default_stages() -> Vec<Stage> {
    Stage::ALL.to_vec()
}

fn default_single_transaction() -> bool {
    true
}

fn default_expire_days() -> u32 {
    14
}

fn default_hooks() -> Vec<String> {
    vec!["checksums".to_string(), "metrics".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Configuration with default settings for the given directories
    pub fn new(mirror_dir: &Path, sources_dir: &Path, cache_dir: &Path) -> Self {
        Self {
            mirror_dir: mirror_dir.to_path_buf(),
            archive_dir: None,
            sources_dir: sources_dir.to_path_buf(),
            cache_dir: cache_dir.to_path_buf(),
            db_path: default_db_path(),
            bin_dir: default_bin_dir(),
            dry_run: false,
            backends: default_backends(),
            stages: default_stages(),
            single_transaction: default_single_transaction(),
            expire_days: default_expire_days(),
            exclude_file: None,
            force_triggers: Vec::new(),
            hooks: default_hooks(),
            hook_timeout: None,
            log_level: default_log_level(),
        }
    }

    /// Parse a configuration from TOML text
    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// Load `path` if given, otherwise the first non-empty default config file
    pub fn find_and_load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        for candidate in DEFAULT_CONFIG_PATHS {
            let candidate = Path::new(candidate);
            if let Ok(meta) = fs::metadata(candidate)
                && meta.len() > 0
            {
                return Self::load(candidate);
            }
        }

        Err(Error::ConfigError(format!(
            "no configuration file found in {:?}",
            DEFAULT_CONFIG_PATHS
        )))
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        for (key, dir) in [
            ("mirror-dir", &self.mirror_dir),
            ("sources-dir", &self.sources_dir),
            ("cache-dir", &self.cache_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(Error::ConfigError(format!("{key} must not be empty")));
            }
        }
        self.triggers()?;
        Ok(())
    }

    /// Execution context derived from `dry-run` and `backends`
    pub fn exec_context(&self) -> ExecContext {
        ExecContext::new(self.dry_run, self.backends.iter().copied())
    }

    /// Parsed `force-triggers`
    pub fn triggers(&self) -> Result<TriggerSet> {
        TriggerSet::parse(&self.force_triggers)
    }

    /// Load exclusion specs from `exclude-file`; a missing file means none
    pub fn exclude_specs(&self) -> Result<Vec<ExcludeSpec>> {
        match &self.exclude_file {
            Some(path) if path.exists() => exclude::load(path),
            Some(path) => {
                warn!("Exclusion file {} does not exist, ignoring", path.display());
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    pub fn hook_timeout(&self) -> Option<Duration> {
        self.hook_timeout.map(Duration::from_secs)
    }

    /// Root of the mirror that archived suites are read from
    pub fn archive_mirror_dir(&self) -> &Path {
        self.archive_dir.as_deref().unwrap_or(&self.mirror_dir)
    }

    /// Path of the on-disk package manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.cache_dir.join("sources.txt")
    }

    /// Path of the on-disk statistics cache
    pub fn stats_cache_path(&self) -> PathBuf {
        self.cache_dir.join("sources_stats.data")
    }

    /// Directory charts are rendered into
    pub fn charts_dir(&self) -> PathBuf {
        self.cache_dir.join("stats")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.cache_dir.join("update.lock")
    }

    /// Log non-default settings that change what a run does
    pub fn warnings(&self) {
        if self.dry_run {
            warn!("note: DRY RUN mode is enabled");
        }
        if self.backends.len() != Backend::ALL.len() {
            let names: Vec<&str> = self.backends.iter().map(|b| b.as_str()).collect();
            warn!("only using backends: {:?}", names);
        }
        if self.stages.len() != Stage::ALL.len() {
            let names: Vec<&str> = self.stages.iter().map(|s| s.as_str()).collect();
            warn!("only doing stages: {:?}", names);
        }
        if !self.force_triggers.is_empty() {
            warn!("forcing triggers: {:?}", self.force_triggers);
        }
    }
}
