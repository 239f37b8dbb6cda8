//! `gce-backend instance`: inspect or update one instance record.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use gce_backend_common::{Instance, InstanceKey};
use serde::Serialize;

use crate::app::AppContext;
use crate::application::ports::EntityStore;
use crate::application::services::{Mutation, instance_state};

/// Instance subcommands.
#[derive(Subcommand)]
pub enum InstanceCommand {
    /// Print the stored record as JSON
    Show {
        /// Instance key: "<base_name> <revision> <zone> <instance_name>"
        key: InstanceKey,
    },
    /// Mark the instance for deletion and clear its lease
    MarkForDeletion {
        /// Instance key: "<base_name> <revision> <zone> <instance_name>"
        key: InstanceKey,
    },
    /// Set the lease expiration time; omit the time to clear it
    Lease {
        /// Instance key: "<base_name> <revision> <zone> <instance_name>"
        key: InstanceKey,
        /// RFC 3339 timestamp, e.g. 2024-01-01T12:00:00Z
        expires: Option<DateTime<Utc>>,
    },
    /// Record the pub/sub subscription the instance listens on
    Subscribe {
        /// Instance key: "<base_name> <revision> <zone> <instance_name>"
        key: InstanceKey,
        /// Project containing the subscription
        #[arg(long)]
        project: String,
        /// Subscription name
        #[arg(long)]
        subscription: String,
        /// Service account allowed to read the subscription
        #[arg(long)]
        service_account: String,
    },
}

#[derive(Serialize)]
struct MutationReport<'a> {
    key: &'a InstanceKey,
    result: &'static str,
}

/// Run the instance command.
///
/// # Errors
///
/// Returns an error if the instance cannot be read or updated.
pub async fn run(app: &AppContext, cmd: InstanceCommand) -> Result<()> {
    let (key, outcome) = match cmd {
        InstanceCommand::Show { key } => return show(app, &key).await,
        InstanceCommand::MarkForDeletion { key } => {
            let outcome = instance_state::mark_for_deletion(&app.store, &app.events, &key).await?;
            (key, outcome)
        }
        InstanceCommand::Lease { key, expires } => {
            let outcome = instance_state::add_lease_expiration_ts(&app.store, &key, expires).await?;
            (key, outcome)
        }
        InstanceCommand::Subscribe {
            key,
            project,
            subscription,
            service_account,
        } => {
            let outcome = instance_state::add_subscription_metadata(
                &app.store,
                &key,
                &project,
                &subscription,
                &service_account,
            )
            .await?;
            (key, outcome)
        }
    };
    if outcome == Mutation::Missing {
        anyhow::bail!("instance {key} does not exist");
    }
    let report = MutationReport {
        key: &key,
        result: outcome.as_str(),
    };
    app.emit(&report, || format!("{key}: {}", outcome.as_str()))
}

async fn show(app: &AppContext, key: &InstanceKey) -> Result<()> {
    let instance = app
        .store
        .get::<Instance>(key)
        .await?
        .with_context(|| format!("instance {key} does not exist"))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&instance).context("JSON serialization failed")?
    );
    Ok(())
}
