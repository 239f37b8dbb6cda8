//! Deletion eligibility rules.
//!
//! Pure functions only. An instance may be deleted when it is pending
//! deletion, or when its group is drained and it is not cataloged; in both
//! cases only while no deletion time has been recorded.

use std::collections::{BTreeSet, HashSet};

use gce_backend_common::{
    Instance, InstanceGroupManager, InstanceTemplate, InstanceTemplateRevision, ManagerKey,
    RevisionKey,
};

/// Whether `manager` is drained, directly through its revision or
/// transitively through its template.
#[must_use]
pub fn is_drained(
    manager: &ManagerKey,
    revision: &InstanceTemplateRevision,
    template: &InstanceTemplate,
) -> bool {
    revision.drained.contains(manager) || template.drained.contains(&revision.key)
}

/// Every drained manager key known to the store.
///
/// A manager listed in a revision's drained set only counts when that
/// revision is its parent, so the result agrees with [`is_drained`].
#[must_use]
pub fn drained_managers(
    templates: &[InstanceTemplate],
    revisions: &[InstanceTemplateRevision],
    managers: &[InstanceGroupManager],
) -> BTreeSet<ManagerKey> {
    let mut drained: BTreeSet<ManagerKey> = revisions
        .iter()
        .flat_map(|revision| {
            revision
                .drained
                .iter()
                .filter(move |manager| manager.parent() == &revision.key)
        })
        .cloned()
        .collect();

    let drained_revisions: HashSet<&RevisionKey> = templates
        .iter()
        .flat_map(|template| {
            template
                .drained
                .iter()
                .filter(move |revision| revision.parent() == &template.key)
        })
        .collect();

    drained.extend(
        managers
            .iter()
            .filter(|manager| drained_revisions.contains(manager.key.parent()))
            .map(|manager| manager.key.clone()),
    );
    drained
}

/// Marked for deletion and not yet deleted.
#[must_use]
pub fn awaits_pending_deletion(instance: &Instance) -> bool {
    instance.pending_deletion && instance.deletion_ts.is_none()
}

/// Deletable once its group is drained: not cataloged, not yet deleted.
#[must_use]
pub fn awaits_drained_deletion(instance: &Instance) -> bool {
    !instance.cataloged && instance.deletion_ts.is_none()
}
