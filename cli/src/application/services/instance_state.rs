//! Single-instance state changes requested by external systems.
//!
//! Each operation is one transaction on the instance record; a missing
//! instance is logged and reported as [`Mutation::Missing`].

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use gce_backend_common::{
    Instance, InstanceKey, MachineEvent, MetadataUpdate, full_subscription_name,
};

use super::Mutation;
use crate::application::ports::{EntityStore, EventSink};

fn describe(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(|| "none".to_string(), |ts| ts.to_rfc3339())
}

/// Mark an instance for deletion, clearing its lease.
///
/// Emits `DELETION_PROPOSED` the first time only.
///
/// # Errors
///
/// Returns an error if the transaction fails.
pub async fn mark_for_deletion(
    store: &impl EntityStore,
    events: &impl EventSink,
    key: &InstanceKey,
) -> Result<Mutation> {
    let (outcome, hostname) = store
        .transact(key, |slot: &mut Option<Instance>| {
            let Some(instance) = slot.as_mut() else {
                return (Mutation::Missing, None);
            };
            if instance.pending_deletion {
                return (Mutation::Unchanged, None);
            }
            instance.lease_expiration_ts = None;
            instance.pending_deletion = true;
            (Mutation::Updated, Some(instance.hostname.clone()))
        })
        .await
        .with_context(|| format!("marking {key} for deletion"))?;
    match (outcome, hostname) {
        (Mutation::Missing, _) => tracing::warn!(key = %key, "instance does not exist"),
        (Mutation::Updated, Some(hostname)) => {
            tracing::info!(key = %key, "instance marked for deletion");
            events.send_event(MachineEvent::DeletionProposed, &hostname);
        }
        _ => {}
    }
    Ok(outcome)
}

/// Record when the lease on an instance expires. `None` clears it.
///
/// # Errors
///
/// Returns an error if the transaction fails.
pub async fn add_lease_expiration_ts(
    store: &impl EntityStore,
    key: &InstanceKey,
    lease_expiration_ts: Option<DateTime<Utc>>,
) -> Result<Mutation> {
    let (outcome, previous) = store
        .transact(key, |slot: &mut Option<Instance>| {
            let Some(instance) = slot.as_mut() else {
                return (Mutation::Missing, None);
            };
            if instance.lease_expiration_ts == lease_expiration_ts {
                return (Mutation::Unchanged, None);
            }
            let previous = instance.lease_expiration_ts;
            instance.lease_expiration_ts = lease_expiration_ts;
            (Mutation::Updated, previous)
        })
        .await
        .with_context(|| format!("updating lease of {key}"))?;
    match outcome {
        Mutation::Missing => tracing::warn!(key = %key, "instance does not exist"),
        Mutation::Updated => tracing::info!(
            key = %key,
            "lease expiration {} -> {}",
            describe(previous),
            describe(lease_expiration_ts),
        ),
        Mutation::Unchanged => {}
    }
    Ok(outcome)
}

/// Record the pub/sub subscription the instance listens on.
///
/// The first subscription wins; later calls change nothing. The first call
/// also queues a metadata update carrying the subscription details.
///
/// # Errors
///
/// Returns an error if the transaction fails.
pub async fn add_subscription_metadata(
    store: &impl EntityStore,
    key: &InstanceKey,
    subscription_project: &str,
    subscription: &str,
    service_account: &str,
) -> Result<Mutation> {
    let outcome = store
        .transact(key, |slot: &mut Option<Instance>| {
            let Some(instance) = slot.as_mut() else {
                return Mutation::Missing;
            };
            if instance
                .pubsub_subscription
                .as_deref()
                .is_some_and(|s| !s.is_empty())
            {
                return Mutation::Unchanged;
            }
            let metadata = BTreeMap::from([
                ("pubsub_service_account".to_string(), service_account.to_string()),
                ("pubsub_subscription".to_string(), subscription.to_string()),
                (
                    "pubsub_subscription_project".to_string(),
                    subscription_project.to_string(),
                ),
            ]);
            instance
                .pending_metadata_updates
                .push(MetadataUpdate { metadata });
            instance.pubsub_service_account = Some(service_account.to_string());
            instance.pubsub_subscription =
                Some(full_subscription_name(subscription_project, subscription));
            Mutation::Updated
        })
        .await
        .with_context(|| format!("recording subscription of {key}"))?;
    match outcome {
        Mutation::Missing => tracing::warn!(key = %key, "instance does not exist"),
        Mutation::Updated => tracing::info!(key = %key, "instance pub/sub subscription received"),
        Mutation::Unchanged => {}
    }
    Ok(outcome)
}

/// Record when the instance was deleted. The first time recorded wins.
///
/// # Errors
///
/// Returns an error if the transaction fails.
pub async fn set_deletion_time(
    store: &impl EntityStore,
    key: &InstanceKey,
    deletion_ts: DateTime<Utc>,
) -> Result<Mutation> {
    let outcome = store
        .transact(key, |slot: &mut Option<Instance>| {
            let Some(instance) = slot.as_mut() else {
                return Mutation::Missing;
            };
            if instance.deletion_ts.is_some() {
                return Mutation::Unchanged;
            }
            instance.deletion_ts = Some(deletion_ts);
            Mutation::Updated
        })
        .await
        .with_context(|| format!("recording deletion time of {key}"))?;
    if outcome == Mutation::Missing {
        tracing::warn!(key = %key, "instance does not exist");
    }
    Ok(outcome)
}
