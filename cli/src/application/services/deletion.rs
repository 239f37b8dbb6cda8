//! Deletion of instances that are pending deletion or belong to a drained
//! instance group manager.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result};
use chrono::Utc;
use gce_backend_common::{
    Instance, InstanceGroupManager, InstanceKey, InstanceTemplate, InstanceTemplateRevision,
    MachineEvent,
};

use super::instance_state::set_deletion_time;
use crate::application::ports::{ComputeApi, EntityStore, EventSink};
use crate::domain::is_drained;

/// HTTP status the compute API answers with when the instance is already gone.
const ALREADY_DELETED_STATUS: u16 = 400;

/// Ask the instance's group manager to delete it.
///
/// The deletion time is recorded when the operation is `DONE` or when the
/// API reports the instance is no longer a member; any other status is only
/// logged.
///
/// # Errors
///
/// Returns an error if the compute call fails for any other reason or the
/// deletion time cannot be recorded.
pub async fn delete_instance(
    store: &impl EntityStore,
    compute: &impl ComputeApi,
    events: &impl EventSink,
    revision: &InstanceTemplateRevision,
    manager: &InstanceGroupManager,
    instance: &Instance,
) -> Result<()> {
    if instance.deletion_ts.is_some() {
        return Ok(());
    }
    let (Some(project), Some(url)) = (revision.project(), instance.url()) else {
        tracing::warn!(key = %instance.key, "instance cannot be deleted without project and URL");
        return Ok(());
    };

    let now = Utc::now();
    let group = manager.key.group_name();
    let result = compute
        .delete_instances(project, &group, manager.key.zone(), &[url.to_string()])
        .await;

    match result {
        Ok(operation) if operation.is_done() => {
            set_deletion_time(store, &instance.key, now).await?;
            tracing::info!(key = %instance.key, "instance deletion scheduled");
            events.send_event(MachineEvent::DeletionScheduled, &instance.hostname);
        }
        Ok(operation) => {
            let detail = serde_json::to_string_pretty(&operation)
                .unwrap_or_else(|_| format!("{operation:?}"));
            tracing::warn!(
                key = %manager.key,
                "instance group manager operation failed:\n{detail}"
            );
        }
        Err(err) if err.status_code() == Some(ALREADY_DELETED_STATUS) => {
            set_deletion_time(store, &instance.key, now).await?;
            tracing::info!(key = %instance.key, "instance already deleted");
            events.send_event(MachineEvent::DeletionSucceeded, &instance.hostname);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("deleting instance {}", instance.key));
        }
    }
    Ok(())
}

/// Instance group manager and revision an instance belongs to, with a
/// warning for the first one missing.
async fn load_ancestors(
    store: &impl EntityStore,
    instance: &Instance,
) -> Result<Option<(InstanceGroupManager, InstanceTemplateRevision)>> {
    let manager_key = &instance.instance_group_manager;
    let Some(manager) = store.get::<InstanceGroupManager>(manager_key).await? else {
        tracing::warn!(key = %manager_key, "instance group manager does not exist");
        return Ok(None);
    };
    let Some(revision) = store
        .get::<InstanceTemplateRevision>(manager.key.parent())
        .await?
    else {
        tracing::warn!(key = %manager.key.parent(), "instance template revision does not exist");
        return Ok(None);
    };
    if revision.project().is_none() {
        tracing::warn!(key = %revision.key, "instance template revision project unspecified");
        return Ok(None);
    }
    Ok(Some((manager, revision)))
}

/// Delete an instance that was marked for deletion.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the deletion fails.
pub async fn delete_pending(
    store: &impl EntityStore,
    compute: &impl ComputeApi,
    events: &impl EventSink,
    key: &InstanceKey,
) -> Result<()> {
    let Some(instance) = store.get::<Instance>(key).await? else {
        return Ok(());
    };
    if instance.deletion_ts.is_some() {
        return Ok(());
    }
    if !instance.pending_deletion {
        tracing::warn!(key = %key, "instance not pending deletion");
        return Ok(());
    }
    if instance.url().is_none() {
        tracing::warn!(key = %key, "instance URL unspecified");
        return Ok(());
    }
    let Some((manager, revision)) = load_ancestors(store, &instance).await? else {
        return Ok(());
    };
    delete_instance(store, compute, events, &revision, &manager, &instance).await
}

/// Delete an uncataloged instance whose group manager is drained.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the deletion fails.
pub async fn delete_drained(
    store: &impl EntityStore,
    compute: &impl ComputeApi,
    events: &impl EventSink,
    key: &InstanceKey,
) -> Result<()> {
    let Some(instance) = store.get::<Instance>(key).await? else {
        tracing::warn!(key = %key, "instance does not exist");
        return Ok(());
    };
    if instance.deletion_ts.is_some() {
        return Ok(());
    }
    if instance.cataloged {
        tracing::warn!(key = %key, "instance is cataloged");
        return Ok(());
    }
    if instance.url().is_none() {
        tracing::warn!(key = %key, "instance URL unspecified");
        return Ok(());
    }
    let Some((manager, revision)) = load_ancestors(store, &instance).await? else {
        return Ok(());
    };
    let Some(template) = store.get::<InstanceTemplate>(revision.key.parent()).await? else {
        tracing::warn!(key = %revision.key.parent(), "instance template does not exist");
        return Ok(());
    };
    if !is_drained(&manager.key, &revision, &template) {
        tracing::warn!(key = %key, "instance is not drained");
        return Ok(());
    }
    delete_instance(store, compute, events, &revision, &manager, &instance).await
}
