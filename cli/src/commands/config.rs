//! `gce-backend config`: show the effective configuration.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use crate::app::AppFlags;
use crate::domain::config::ReconcilerConfig;

#[derive(Serialize)]
struct ShownConfig<'a> {
    path: String,
    config: &'a ReconcilerConfig,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
}

/// Run the config command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or serialized.
pub fn run(flags: &AppFlags, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show_config(flags),
    }
}

fn show_config(flags: &AppFlags) -> Result<()> {
    let store = flags.config_store();
    let config = store.load()?;
    if flags.json {
        let value = ShownConfig {
            path: store.path()?.display().to_string(),
            config: &config,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("JSON serialization failed")?
        );
    } else {
        if !flags.quiet {
            println!("# {}", store.path()?.display());
        }
        print!(
            "{}",
            serde_yaml::to_string(&config).context("cannot serialize config")?
        );
    }
    Ok(())
}
