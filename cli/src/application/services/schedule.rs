//! Periodic scans that turn store state into dispatched tasks.
//!
//! Each pass returns the number of tasks it enqueued.

use std::collections::HashSet;

use anyhow::{Context, Result};
use gce_backend_common::{
    Instance, InstanceGroupManager, InstanceTemplate, InstanceTemplateRevision,
};

use crate::application::ports::{EntityStore, Task, TaskDispatcher};
use crate::domain::{awaits_drained_deletion, awaits_pending_deletion, drained_managers};

async fn enqueue(dispatcher: &impl TaskDispatcher, task: Task) -> Result<()> {
    tracing::debug!(task = %task, "enqueueing task");
    dispatcher
        .enqueue(task.clone())
        .await
        .with_context(|| format!("enqueueing {task}"))
}

/// Enqueue discovery for every instance group manager with a URL.
///
/// # Errors
///
/// Returns an error if the scan or an enqueue fails.
pub async fn schedule_fetch(
    store: &impl EntityStore,
    dispatcher: &impl TaskDispatcher,
) -> Result<usize> {
    let managers: Vec<InstanceGroupManager> = store.query().await?;
    let mut count = 0;
    for manager in managers.into_iter().filter(|m| m.url().is_some()) {
        enqueue(dispatcher, Task::FetchInstances(manager.key)).await?;
        count += 1;
    }
    tracing::info!(count, "scheduled instance fetches");
    Ok(count)
}

/// Enqueue deletion for every instance marked for deletion.
///
/// # Errors
///
/// Returns an error if the scan or an enqueue fails.
pub async fn schedule_pending_deletion(
    store: &impl EntityStore,
    dispatcher: &impl TaskDispatcher,
) -> Result<usize> {
    let instances: Vec<Instance> = store.query().await?;
    let mut count = 0;
    for instance in instances.into_iter().filter(awaits_pending_deletion) {
        enqueue(dispatcher, Task::DeletePending(instance.key)).await?;
        count += 1;
    }
    tracing::info!(count, "scheduled pending deletions");
    Ok(count)
}

/// Enqueue deletion for every deletable instance of a drained group.
///
/// # Errors
///
/// Returns an error if a scan, a read or an enqueue fails.
pub async fn schedule_drained_deletion(
    store: &impl EntityStore,
    dispatcher: &impl TaskDispatcher,
) -> Result<usize> {
    let templates: Vec<InstanceTemplate> = store.query().await?;
    let revisions: Vec<InstanceTemplateRevision> = store.query().await?;
    let managers: Vec<InstanceGroupManager> = store.query().await?;
    let drained = drained_managers(&templates, &revisions, &managers);

    let mut seen = HashSet::new();
    let mut count = 0;
    for manager in managers.iter().filter(|m| drained.contains(&m.key)) {
        for key in &manager.instances {
            if !seen.insert(key) {
                continue;
            }
            let Some(instance) = store.get::<Instance>(key).await? else {
                continue;
            };
            if awaits_drained_deletion(&instance) {
                enqueue(dispatcher, Task::DeleteDrained(instance.key)).await?;
                count += 1;
            }
        }
    }
    tracing::info!(count, drained = drained.len(), "scheduled drained deletions");
    Ok(count)
}
