//! `gce-backend reconcile`: periodic scan passes plus a task worker.
//!
//! Runs until Ctrl-C. The scheduler, the worker and the signal handler are
//! joined on the current task; shutdown is broadcast over a watch channel.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::app::AppContext;
use crate::application::services::schedule;

/// Run the reconcile loop.
///
/// # Errors
///
/// Never fails once started; pass and task failures are logged.
pub async fn run(app: &AppContext) -> Result<()> {
    let (stop_tx, stop_rx) = watch::channel(false);

    let signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("cannot listen for Ctrl-C: {e}");
        }
        tracing::info!("shutting down");
        let _ = stop_tx.send(true);
    };

    let worker_stop = stop_rx.clone();
    let worker = app.dispatcher.run(
        move |task| async move { app.execute(&task).await },
        stopped(worker_stop),
    );

    tracing::info!(
        fetch_interval_secs = app.config.schedule.fetch_interval_secs,
        deletion_interval_secs = app.config.schedule.deletion_interval_secs,
        "reconciler started"
    );
    let ((), report, ()) = tokio::join!(signal, worker, scheduler(app, stop_rx));
    tracing::info!(
        succeeded = report.succeeded,
        redelivered = report.redelivered,
        dropped = report.dropped,
        "reconciler stopped"
    );
    Ok(())
}

async fn stopped(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

async fn scheduler(app: &AppContext, mut stop: watch::Receiver<bool>) {
    let mut fetch = tokio::time::interval(Duration::from_secs(
        app.config.schedule.fetch_interval_secs,
    ));
    let mut deletion = tokio::time::interval(Duration::from_secs(
        app.config.schedule.deletion_interval_secs,
    ));
    fetch.set_missed_tick_behavior(MissedTickBehavior::Delay);
    deletion.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.wait_for(|stopped| *stopped) => break,
            _ = fetch.tick() => {
                log_pass("fetch", schedule::schedule_fetch(&app.store, &app.dispatcher).await);
            }
            _ = deletion.tick() => {
                log_pass(
                    "pending-deletion",
                    schedule::schedule_pending_deletion(&app.store, &app.dispatcher).await,
                );
                log_pass(
                    "drained-deletion",
                    schedule::schedule_drained_deletion(&app.store, &app.dispatcher).await,
                );
            }
        }
    }
}

fn log_pass(pass: &str, result: Result<usize>) {
    if let Err(e) = result {
        tracing::error!(pass, "scan pass failed: {e:#}");
    }
}
