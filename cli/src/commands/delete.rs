//! `gce-backend delete`: delete one instance now.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use gce_backend_common::{Instance, InstanceKey};
use serde::Serialize;

use crate::app::AppContext;
use crate::application::ports::EntityStore;
use crate::application::services::deletion;

/// Deletion subcommands.
#[derive(Subcommand)]
pub enum DeleteCommand {
    /// Delete an instance marked for deletion
    Pending {
        /// Instance key: "<base_name> <revision> <zone> <instance_name>"
        key: InstanceKey,
    },
    /// Delete an uncataloged instance of a drained instance group manager
    Drained {
        /// Instance key: "<base_name> <revision> <zone> <instance_name>"
        key: InstanceKey,
    },
}

#[derive(Serialize)]
struct DeletionStatus<'a> {
    key: &'a InstanceKey,
    deletion_ts: Option<DateTime<Utc>>,
}

/// Run the delete command.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the deletion fails.
pub async fn run(app: &AppContext, cmd: DeleteCommand) -> Result<()> {
    let key = match cmd {
        DeleteCommand::Pending { key } => {
            deletion::delete_pending(&app.store, &app.compute, &app.events, &key).await?;
            key
        }
        DeleteCommand::Drained { key } => {
            deletion::delete_drained(&app.store, &app.compute, &app.events, &key).await?;
            key
        }
    };
    let deletion_ts = app
        .store
        .get::<Instance>(&key)
        .await?
        .and_then(|instance| instance.deletion_ts);
    let status = DeletionStatus {
        key: &key,
        deletion_ts,
    };
    app.emit(&status, || match deletion_ts {
        Some(ts) => format!("{key}: deleted at {}", ts.to_rfc3339()),
        None => format!("{key}: not deleted"),
    })
}
