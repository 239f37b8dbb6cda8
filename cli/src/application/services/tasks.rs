//! Task execution: route a dispatched task to its handler.

use anyhow::{Context, Result};

use super::{deletion, discovery};
use crate::application::ports::{ComputeApi, EntityStore, EventSink, Task};
use crate::domain::config::DiscoveryConfig;

/// Run one task to completion.
///
/// # Errors
///
/// Returns the handler's error, annotated with the task.
pub async fn execute(
    store: &impl EntityStore,
    compute: &impl ComputeApi,
    events: &impl EventSink,
    discovery: &DiscoveryConfig,
    task: &Task,
) -> Result<()> {
    tracing::debug!(task = %task, "executing task");
    let result = match task {
        Task::FetchInstances(key) => {
            discovery::ensure_entities_exist(store, compute, events, key, discovery).await
        }
        Task::DeletePending(key) => deletion::delete_pending(store, compute, events, key).await,
        Task::DeleteDrained(key) => deletion::delete_drained(store, compute, events, key).await,
    };
    result.with_context(|| format!("task {task} failed"))
}
