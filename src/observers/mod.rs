// src/observers/mod.rs

//! Built-in in-process observers
//!
//! Enabled by name through the `hooks` configuration list; each one is
//! subscribed to both package events.

pub mod checksums;
pub mod metrics;

pub use checksums::ChecksumsObserver;
pub use metrics::MetricsObserver;

use crate::config::Config;
use crate::context::Backend;
use crate::error::{Error, Result};
use crate::hooks::{Event, Observer, ObserverRegistry};

/// Names accepted in the `hooks` configuration list
pub const AVAILABLE: &[&str] = &[checksums::TITLE, metrics::TITLE];

/// Build the registry for the observers named in `config.hooks`
pub fn load(config: &Config) -> Result<ObserverRegistry> {
    let write_sidecars = config.exec_context().should_write(Backend::Fs);
    let mut registry = ObserverRegistry::new();

    for name in &config.hooks {
        for event in Event::ALL {
            registry.subscribe(event, build(name, write_sidecars)?);
        }
    }

    Ok(registry)
}

fn build(name: &str, write_sidecars: bool) -> Result<Box<dyn Observer>> {
    match name {
        checksums::TITLE => Ok(Box::new(ChecksumsObserver::new(write_sidecars))),
        metrics::TITLE => Ok(Box::new(MetricsObserver::new())),
        _ => Err(Error::ConfigError(format!(
            "unknown hook '{}', available: {}",
            name,
            AVAILABLE.join(", ")
        ))),
    }
}
