// src/commands/update.rs
//! The update command: run pipeline stages against the mirror

use super::open_db;
use anyhow::{Context, Result, bail};
use srcmirror::{Backend, Config, Stage, Updater};
use tracing::info;

/// Command-line settings that take precedence over the config file
#[derive(Debug, Default)]
pub struct UpdateOverrides {
    pub stages: Vec<String>,
    pub backends: Vec<String>,
    pub dry_run: bool,
    pub force_triggers: Vec<String>,
    pub single_transaction: Option<String>,
}

impl UpdateOverrides {
    /// Apply these overrides on top of `config`
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if !self.stages.is_empty() {
            let mut stages = self
                .stages
                .iter()
                .map(|s| s.parse::<Stage>())
                .collect::<srcmirror::Result<Vec<_>>>()?;
            stages.sort();
            stages.dedup();
            config.stages = stages;
        }

        if self.backends.iter().any(|b| b == "none") {
            config.backends.clear();
        } else if !self.backends.is_empty() {
            let mut backends = self
                .backends
                .iter()
                .map(|b| b.parse::<Backend>())
                .collect::<srcmirror::Result<Vec<_>>>()?;
            backends.sort();
            backends.dedup();
            config.backends = backends;
        }

        if self.dry_run {
            config.dry_run = true;
        }
        if !self.force_triggers.is_empty() {
            config.force_triggers = self.force_triggers.clone();
        }

        match self.single_transaction.as_deref() {
            None => {}
            Some("yes") => config.single_transaction = true,
            Some("no") => config.single_transaction = false,
            Some(other) => bail!("--single-transaction expects yes or no, got '{}'", other),
        }
        Ok(())
    }
}

/// Run the configured update stages
pub fn cmd_update(mut config: Config, overrides: &UpdateOverrides) -> Result<()> {
    overrides.apply(&mut config)?;
    config.warnings();

    let stages = config.stages.clone();
    let updater = Updater::new(config).context("invalid update configuration")?;
    let mut conn = open_db(updater.config())?;

    let status = updater.run(&mut conn, &stages).context("update failed")?;
    info!("{} packages listed in the sources manifest", status.sources.len());
    Ok(())
}
