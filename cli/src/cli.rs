//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::app::{AppContext, AppFlags};
use crate::commands;

/// Reconcile managed instance group VMs with the entity store
#[derive(Parser)]
#[command(
    name = "gce-backend",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Configuration file [default: ~/.gce-backend/config.yaml]
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Entity store snapshot file [default: ~/.gce-backend/store.json]
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log more detail (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one scan pass, then execute the queued tasks
    #[command(subcommand)]
    Schedule(commands::schedule::ScheduleCommand),

    /// List the instance URLs of one instance group manager
    Fetch(commands::fetch::FetchArgs),

    /// Inspect or update one instance
    #[command(subcommand)]
    Instance(commands::instance::InstanceCommand),

    /// Delete one instance
    #[command(subcommand)]
    Delete(commands::delete::DeleteCommand),

    /// Run scan passes periodically until interrupted
    Reconcile,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Default log filter for the verbosity flags; `RUST_LOG` overrides it.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            config,
            store,
            json,
            quiet,
            verbose: _,
            command,
        } = self;

        let flags = AppFlags {
            config,
            store,
            json,
            quiet,
        };
        match command {
            Command::Version => {
                commands::version::run(json);
                Ok(())
            }
            Command::Config(cmd) => commands::config::run(&flags, cmd),
            Command::Schedule(cmd) => {
                let app = AppContext::new(&flags).await?;
                commands::schedule::run(&app, cmd).await
            }
            Command::Fetch(args) => {
                let app = AppContext::new(&flags).await?;
                commands::fetch::run(&app, &args).await
            }
            Command::Instance(cmd) => {
                let app = AppContext::new(&flags).await?;
                commands::instance::run(&app, cmd).await
            }
            Command::Delete(cmd) => {
                let app = AppContext::new(&flags).await?;
                commands::delete::run(&app, cmd).await
            }
            Command::Reconcile => {
                let app = AppContext::new(&flags).await?;
                commands::reconcile::run(&app).await
            }
        }
    }
}
