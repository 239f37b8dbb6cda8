//! `gce-backend schedule`: one scan pass followed by a queue drain.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use crate::app::AppContext;
use crate::application::services::schedule;

/// Scan passes.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleCommand {
    /// Discover the instances of every instance group manager with a URL
    Fetch,
    /// Delete instances marked for deletion
    PendingDeletion,
    /// Delete uncataloged instances of drained instance group managers
    DrainedDeletion,
}

#[derive(Serialize)]
struct PassReport {
    enqueued: usize,
    succeeded: usize,
    redelivered: usize,
    dropped: usize,
}

/// Run the schedule command.
///
/// # Errors
///
/// Returns an error if the scan fails. Task failures are reported, not
/// returned.
pub async fn run(app: &AppContext, cmd: ScheduleCommand) -> Result<()> {
    let enqueued = match cmd {
        ScheduleCommand::Fetch => schedule::schedule_fetch(&app.store, &app.dispatcher).await?,
        ScheduleCommand::PendingDeletion => {
            schedule::schedule_pending_deletion(&app.store, &app.dispatcher).await?
        }
        ScheduleCommand::DrainedDeletion => {
            schedule::schedule_drained_deletion(&app.store, &app.dispatcher).await?
        }
    };
    let drained = app.drain().await;
    let report = PassReport {
        enqueued,
        succeeded: drained.succeeded,
        redelivered: drained.redelivered,
        dropped: drained.dropped,
    };
    app.emit(&report, || {
        format!(
            "{} task(s) enqueued: {} succeeded, {} redelivered, {} dropped",
            report.enqueued, report.succeeded, report.redelivered, report.dropped
        )
    })
}
