//! Instance lifecycle through the scan passes and the task queue:
//! discovery, then deletion of marked and drained instances.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use gce_backend::application::ports::{ComputeApi, EntityStore, EventSink};
use gce_backend::application::services::{Mutation, instance_state, schedule, tasks};
use gce_backend::domain::config::{DiscoveryConfig, DispatcherConfig};
use gce_backend::infra::dispatcher::{DrainReport, QueueDispatcher};
use gce_backend::infra::file_store::JsonFileStore;
use gce_backend::infra::memory_store::MemoryStore;
use gce_backend_common::{
    Instance, InstanceGroupManager, InstanceKey, InstanceTemplate, MachineEvent,
};

use crate::helpers::{CannedCompute, RecordingEvents, chain, instance_url, manager_key};

fn dispatcher(max_attempts: u32) -> QueueDispatcher {
    QueueDispatcher::new(DispatcherConfig {
        concurrency: 4,
        max_attempts,
        retry_delay_ms: 10,
    })
}

async fn drain(
    dispatcher: &QueueDispatcher,
    store: &impl EntityStore,
    compute: &impl ComputeApi,
    events: &impl EventSink,
) -> DrainReport {
    let discovery = DiscoveryConfig::default();
    let discovery = &discovery;
    dispatcher
        .drain(move |task| async move {
            tasks::execute(store, compute, events, discovery, &task).await
        })
        .await
}

async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    let (template, revision, manager) = chain();
    store.put(&template).await.unwrap();
    store.put(&revision).await.unwrap();
    store.put(&manager).await.unwrap();
    store
}

fn key(name: &str) -> InstanceKey {
    manager_key().instance(name).unwrap()
}

async fn load(store: &impl EntityStore, name: &str) -> Instance {
    store.get(&key(name)).await.unwrap().expect("instance exists")
}

#[tokio::test]
async fn fetch_pass_records_discovered_instances() {
    let store = seeded_store().await;
    let compute = CannedCompute::listing(&["base-rev-a", "base-rev-b"]);
    let events = RecordingEvents::default();
    let queue = dispatcher(3);

    let enqueued = schedule::schedule_fetch(&store, &queue).await.unwrap();
    assert_eq!(enqueued, 1);
    let report = drain(&queue, &store, &compute, &events).await;
    assert_eq!(report.succeeded, 1);

    let manager: InstanceGroupManager = store.get(&manager_key()).await.unwrap().unwrap();
    let mut listed = manager.instances.clone();
    listed.sort();
    assert_eq!(listed, vec![key("base-rev-a"), key("base-rev-b")]);

    let a = load(&store, "base-rev-a").await;
    assert_eq!(a.url.as_deref(), Some(instance_url("base-rev-a").as_str()));
    assert_eq!(a.hostname, "base-rev-a");
    assert_eq!(a.instance_group_manager, manager_key());
    assert!(!a.cataloged);
    assert_eq!(events.count(MachineEvent::Created), 2);
}

#[tokio::test]
async fn repeated_fetch_pass_is_idempotent() {
    let store = seeded_store().await;
    let compute = CannedCompute::listing(&["base-rev-a"]);
    let events = RecordingEvents::default();
    let queue = dispatcher(3);

    for _ in 0..2 {
        schedule::schedule_fetch(&store, &queue).await.unwrap();
        drain(&queue, &store, &compute, &events).await;
    }
    assert_eq!(events.count(MachineEvent::Created), 1);
}

#[tokio::test]
async fn marked_instance_is_deleted_once() {
    let store = seeded_store().await;
    let compute = CannedCompute::listing(&["base-rev-a", "base-rev-b"]);
    let events = RecordingEvents::default();
    let queue = dispatcher(3);
    schedule::schedule_fetch(&store, &queue).await.unwrap();
    drain(&queue, &store, &compute, &events).await;

    let outcome = instance_state::mark_for_deletion(&store, &events, &key("base-rev-a"))
        .await
        .unwrap();
    assert_eq!(outcome, Mutation::Updated);

    assert_eq!(schedule::schedule_pending_deletion(&store, &queue).await.unwrap(), 1);
    let report = drain(&queue, &store, &compute, &events).await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(compute.deleted_urls(), vec![instance_url("base-rev-a")]);
    assert!(load(&store, "base-rev-a").await.deletion_ts.is_some());
    assert!(load(&store, "base-rev-b").await.deletion_ts.is_none());
    assert_eq!(events.count(MachineEvent::DeletionProposed), 1);
    assert_eq!(events.count(MachineEvent::DeletionScheduled), 1);

    assert_eq!(schedule::schedule_pending_deletion(&store, &queue).await.unwrap(), 0);
}

#[tokio::test]
async fn drained_template_deletes_uncataloged_instances() {
    let store = seeded_store().await;
    let compute = CannedCompute::listing(&["base-rev-a", "base-rev-b"]);
    let events = RecordingEvents::default();
    let queue = dispatcher(3);
    schedule::schedule_fetch(&store, &queue).await.unwrap();
    drain(&queue, &store, &compute, &events).await;

    let mut cataloged = load(&store, "base-rev-b").await;
    cataloged.cataloged = true;
    store.put(&cataloged).await.unwrap();

    let template_key = manager_key().parent().parent().clone();
    let mut template: InstanceTemplate = store.get(&template_key).await.unwrap().unwrap();
    template.drained.insert(manager_key().parent().clone());
    store.put(&template).await.unwrap();

    assert_eq!(schedule::schedule_drained_deletion(&store, &queue).await.unwrap(), 1);
    drain(&queue, &store, &compute, &events).await;
    assert_eq!(compute.deleted_urls(), vec![instance_url("base-rev-a")]);
    assert!(load(&store, "base-rev-a").await.deletion_ts.is_some());
    assert!(load(&store, "base-rev-b").await.deletion_ts.is_none());
}

#[tokio::test]
async fn instance_already_gone_counts_as_deleted() {
    let store = seeded_store().await;
    let compute = CannedCompute::listing(&["base-rev-a"]).rejecting_deletes(400);
    let events = RecordingEvents::default();
    let queue = dispatcher(3);
    schedule::schedule_fetch(&store, &queue).await.unwrap();
    drain(&queue, &store, &compute, &events).await;
    instance_state::mark_for_deletion(&store, &events, &key("base-rev-a"))
        .await
        .unwrap();

    schedule::schedule_pending_deletion(&store, &queue).await.unwrap();
    let report = drain(&queue, &store, &compute, &events).await;
    assert_eq!(report.succeeded, 1);
    assert!(load(&store, "base-rev-a").await.deletion_ts.is_some());
    assert_eq!(events.count(MachineEvent::DeletionSucceeded), 1);
}

#[tokio::test]
async fn rejected_deletion_is_retried_then_dropped() {
    let store = seeded_store().await;
    let compute = CannedCompute::listing(&["base-rev-a"]).rejecting_deletes(503);
    let events = RecordingEvents::default();
    let queue = dispatcher(2);
    schedule::schedule_fetch(&store, &queue).await.unwrap();
    drain(&queue, &store, &compute, &events).await;
    instance_state::mark_for_deletion(&store, &events, &key("base-rev-a"))
        .await
        .unwrap();

    schedule::schedule_pending_deletion(&store, &queue).await.unwrap();
    let report = drain(&queue, &store, &compute, &events).await;
    assert_eq!(
        report,
        DrainReport {
            succeeded: 0,
            redelivered: 1,
            dropped: 1,
        }
    );
    assert_eq!(compute.deleted_urls().len(), 2);
    assert!(load(&store, "base-rev-a").await.deletion_ts.is_none());
}

#[tokio::test]
async fn failed_listing_leaves_instances_untouched() {
    let store = seeded_store().await;
    let events = RecordingEvents::default();
    let queue = dispatcher(1);
    schedule::schedule_fetch(&store, &queue).await.unwrap();
    drain(&queue, &store, &CannedCompute::listing(&["base-rev-a"]), &events).await;

    schedule::schedule_fetch(&store, &queue).await.unwrap();
    let report = drain(&queue, &store, &CannedCompute::failing(500), &events).await;
    assert_eq!(report.dropped, 1);
    let manager: InstanceGroupManager = store.get(&manager_key()).await.unwrap().unwrap();
    assert_eq!(manager.instances, vec![key("base-rev-a")]);
}

#[tokio::test]
async fn file_store_keeps_discovered_instances_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    {
        let store = JsonFileStore::open(path.clone()).await.unwrap();
        let (template, revision, manager) = chain();
        store.put(&template).await.unwrap();
        store.put(&revision).await.unwrap();
        store.put(&manager).await.unwrap();

        let compute = CannedCompute::listing(&["base-rev-a"]);
        let events = RecordingEvents::default();
        let queue = dispatcher(3);
        schedule::schedule_fetch(&store, &queue).await.unwrap();
        drain(&queue, &store, &compute, &events).await;
    }

    let reopened = JsonFileStore::open(path).await.unwrap();
    let instance = load(&reopened, "base-rev-a").await;
    assert_eq!(instance.hostname, "base-rev-a");
    let manager: InstanceGroupManager = reopened.get(&manager_key()).await.unwrap().unwrap();
    assert_eq!(manager.instances, vec![key("base-rev-a")]);
}
