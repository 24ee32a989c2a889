// src/main.rs

use anyhow::Result;
use clap::Parser;
use srcmirror::Config;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{ArchiveCommands, Cli, Commands};

/// `RUST_LOG` when set, else the configured level raised by `-v`
fn log_filter(level: &str, verbose: u8) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = match verbose {
        0 => level,
        1 => "debug",
        _ => "trace",
    };
    EnvFilter::new(level)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::find_and_load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&config.log_level, cli.verbose))
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&config),
        Commands::Update {
            stages,
            backends,
            dry_run,
            force_triggers,
            single_transaction,
        } => {
            let overrides = commands::UpdateOverrides {
                stages,
                backends,
                dry_run,
                force_triggers,
                single_transaction,
            };
            commands::cmd_update(config, &overrides)
        }
        Commands::Archive(cmd) => match cmd {
            ArchiveCommands::List => commands::cmd_archive_list(&config),
            ArchiveCommands::Add { suite } => commands::cmd_archive_add(config, &suite),
            ArchiveCommands::Remove { suite } => commands::cmd_archive_remove(config, &suite),
        },
    }
}
