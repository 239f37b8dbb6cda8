//! Instance discovery: list a group's instances and make sure a record
//! exists for each of them.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::collections::{BTreeSet, HashSet};

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use gce_backend_common::{
    Instance, InstanceGroupManager, InstanceKey, InstanceTemplateRevision, MachineEvent,
    ManagerKey, extract_instance_name,
};

use super::Mutation;
use crate::application::ports::{ComputeApi, EntityStore, EventSink};
use crate::domain::config::DiscoveryConfig;

/// URLs of every instance the cloud provider reports for `key`'s group.
///
/// Returns an empty list, with a warning, when the manager has no URL yet
/// or its revision has no project.
///
/// # Errors
///
/// Returns an error if the store cannot be read or a list call fails.
pub async fn fetch(
    store: &impl EntityStore,
    compute: &impl ComputeApi,
    key: &ManagerKey,
    page_size: u32,
) -> Result<Vec<String>> {
    let Some(manager) = store.get::<InstanceGroupManager>(key).await? else {
        tracing::warn!(key = %key, "instance group manager does not exist");
        return Ok(Vec::new());
    };
    if manager.url().is_none() {
        tracing::warn!(key = %key, "instance group URL unspecified");
        return Ok(Vec::new());
    }
    let Some(revision) = store.get::<InstanceTemplateRevision>(key.parent()).await? else {
        tracing::warn!(key = %key.parent(), "instance template revision does not exist");
        return Ok(Vec::new());
    };
    let Some(project) = revision.project() else {
        tracing::warn!(key = %revision.key, "instance template revision project unspecified");
        return Ok(Vec::new());
    };

    let group = key.group_name();
    let mut urls = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let page = compute
            .list_instances_in_group(project, &group, key.zone(), page_size, page_token.as_deref())
            .await
            .with_context(|| format!("listing instances of {group} in {}", key.zone()))?;
        urls.extend(page.items.into_iter().map(|item| item.instance));
        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }
    tracing::debug!(key = %key, count = urls.len(), "fetched instance URLs");
    Ok(urls)
}

/// Create the record for one discovered instance unless it already exists.
///
/// Emits `CREATED` only from the caller whose transaction wrote the record.
///
/// # Errors
///
/// Returns an error if the store read or transaction fails.
pub async fn ensure_entity_exists(
    store: &impl EntityStore,
    events: &impl EventSink,
    key: &InstanceKey,
    url: &str,
    manager: &ManagerKey,
) -> Result<()> {
    if store.get::<Instance>(key).await?.is_some() {
        return Ok(());
    }
    let created = store
        .transact(key, |slot: &mut Option<Instance>| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(Instance::new(key.clone(), url, manager.clone()));
            true
        })
        .await
        .with_context(|| format!("creating instance {key}"))?;
    if created {
        tracing::info!(key = %key, "instance created");
        let hostname = extract_instance_name(url).unwrap_or(key.instance_name());
        events.send_event(MachineEvent::Created, hostname);
    }
    Ok(())
}

/// Discover the instances of `key`'s group and record them.
///
/// Every creation is attempted, at most `max_concurrent` at a time. The
/// manager's instance list is replaced only when all of them succeed.
///
/// # Errors
///
/// Returns the first creation error, or an error from listing or from
/// updating the manager.
pub async fn ensure_entities_exist(
    store: &impl EntityStore,
    compute: &impl ComputeApi,
    events: &impl EventSink,
    key: &ManagerKey,
    config: &DiscoveryConfig,
) -> Result<()> {
    let mut urls = fetch(store, compute, key, config.page_size).await?;
    // A group resized mid-listing can report an instance on two pages.
    let mut seen = HashSet::new();
    urls.retain(|url| seen.insert(url.clone()));
    if urls.is_empty() {
        set_instances(store, key, &[]).await?;
        return Ok(());
    }

    let keys = urls
        .iter()
        .map(|url| instance_key(key, url))
        .collect::<Result<Vec<_>>>()?;

    let results: Vec<Result<()>> = stream::iter(keys.iter().zip(&urls))
        .map(|(instance, url)| ensure_entity_exists(store, events, instance, url, key))
        .buffer_unordered(config.max_concurrent.max(1))
        .collect()
        .await;
    if let Some(err) = results.into_iter().find_map(Result::err) {
        return Err(err.context(format!("recording instances of {key}")));
    }

    set_instances(store, key, &keys).await?;
    Ok(())
}

fn instance_key(manager: &ManagerKey, url: &str) -> Result<InstanceKey> {
    let name = extract_instance_name(url)
        .with_context(|| format!("instance URL '{url}' has no instance name"))?;
    manager
        .instance(name)
        .with_context(|| format!("instance URL '{url}'"))
}

/// Replace the manager's instance list.
///
/// Nothing is written when the stored list holds the same keys in any order.
///
/// # Errors
///
/// Returns an error if the transaction fails.
pub async fn set_instances(
    store: &impl EntityStore,
    key: &ManagerKey,
    instances: &[InstanceKey],
) -> Result<Mutation> {
    let outcome = store
        .transact(key, |slot: &mut Option<InstanceGroupManager>| {
            let Some(manager) = slot.as_mut() else {
                return Mutation::Missing;
            };
            let same = manager.instances.iter().collect::<BTreeSet<_>>()
                == instances.iter().collect::<BTreeSet<_>>();
            if same {
                return Mutation::Unchanged;
            }
            manager.instances = instances.to_vec();
            Mutation::Updated
        })
        .await
        .with_context(|| format!("updating instances of {key}"))?;
    match outcome {
        Mutation::Missing => tracing::warn!(key = %key, "instance group manager does not exist"),
        Mutation::Updated => {
            tracing::info!(key = %key, count = instances.len(), "instance group manager instances updated");
        }
        Mutation::Unchanged => {}
    }
    Ok(outcome)
}
