//! Property-based tests for drain detection and configuration bounds.
//!
//! Uses `proptest` to check invariants over random store contents.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;

use gce_backend::domain::config::{MAX_PAGE_SIZE, ReconcilerConfig};
use gce_backend::domain::{
    awaits_drained_deletion, awaits_pending_deletion, drained_managers, is_drained,
};
use gce_backend_common::{
    Instance, InstanceGroupManager, InstanceTemplate, InstanceTemplateRevision, ManagerKey,
};

const REVISIONS: [&str; 3] = ["r1", "r2", "r3"];
const ZONES: [&str; 3] = ["za", "zb", "zc"];

fn manager(revision: usize, zone: usize) -> ManagerKey {
    ManagerKey::from_parts("base", REVISIONS[revision], ZONES[zone]).unwrap()
}

/// One template with three revisions and nine managers. `drained_revisions`
/// and `drained_managers` pick entries by index.
fn hierarchy(
    drained_revisions: &[usize],
    drained_zones: &[(usize, usize)],
) -> (
    InstanceTemplate,
    Vec<InstanceTemplateRevision>,
    Vec<InstanceGroupManager>,
) {
    let managers: Vec<InstanceGroupManager> = (0..REVISIONS.len())
        .flat_map(|r| (0..ZONES.len()).map(move |z| InstanceGroupManager::new(manager(r, z))))
        .collect();
    let mut template = InstanceTemplate::new(managers[0].key.parent().parent().clone());
    let mut revisions: Vec<InstanceTemplateRevision> = (0..REVISIONS.len())
        .map(|r| InstanceTemplateRevision::new(manager(r, 0).parent().clone(), "proj"))
        .collect();
    for &r in drained_revisions {
        template.drained.insert(revisions[r].key.clone());
    }
    for &(r, z) in drained_zones {
        revisions[r].drained.insert(manager(r, z));
    }
    (template, revisions, managers)
}

proptest! {
    /// The store-wide drained set agrees with the per-manager check.
    #[test]
    fn prop_drained_set_agrees_with_is_drained(
        drained_revisions in prop::collection::vec(0usize..3, 0..3),
        drained_zones in prop::collection::vec((0usize..3, 0usize..3), 0..5),
    ) {
        let (template, revisions, managers) = hierarchy(&drained_revisions, &drained_zones);
        let drained = drained_managers(std::slice::from_ref(&template), &revisions, &managers);
        for m in &managers {
            let revision = revisions.iter().find(|r| &r.key == m.key.parent()).unwrap();
            prop_assert_eq!(
                drained.contains(&m.key),
                is_drained(&m.key, revision, &template),
                "disagreement for {}", m.key
            );
        }
    }

    /// A drained revision drains every one of its managers.
    #[test]
    fn prop_drained_revision_covers_all_zones(revision in 0usize..3) {
        let (template, revisions, managers) = hierarchy(&[revision], &[]);
        let drained = drained_managers(&[template], &revisions, &managers);
        prop_assert_eq!(drained.len(), ZONES.len());
        prop_assert!(drained.iter().all(|m| m.parent() == manager(revision, 0).parent()));
    }

    /// Once a deletion time is recorded nothing schedules the instance again.
    #[test]
    fn prop_deleted_instance_is_never_eligible(pending in any::<bool>(), cataloged in any::<bool>()) {
        let key = manager(0, 0).instance("vm").unwrap();
        let mut instance = Instance::new(key, "https://x/instances/vm", manager(0, 0));
        instance.pending_deletion = pending;
        instance.cataloged = cataloged;
        instance.deletion_ts = Some(chrono::Utc::now());
        prop_assert!(!awaits_pending_deletion(&instance));
        prop_assert!(!awaits_drained_deletion(&instance));
    }

    /// Page sizes validate exactly in 1..=MAX_PAGE_SIZE.
    #[test]
    fn prop_page_size_bounds(page_size in 0u32..2000) {
        let mut config = ReconcilerConfig::default();
        config.discovery.page_size = page_size;
        let valid = (1..=MAX_PAGE_SIZE).contains(&page_size);
        prop_assert_eq!(config.validate().is_ok(), valid);
    }
}

#[test]
fn manager_under_foreign_revision_is_not_drained() {
    let (template, mut revisions, managers) = hierarchy(&[], &[]);
    // r1 lists a manager that belongs to r2.
    revisions[0].drained.insert(manager(1, 0));
    let drained = drained_managers(&[template], &revisions, &managers);
    assert!(drained.is_empty());
}
