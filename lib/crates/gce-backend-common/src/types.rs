use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::keys::{InstanceKey, ManagerKey, RevisionKey, TemplateKey};

/// A record kind persisted in the entity store.
///
/// The store addresses a record by `(KIND, key.to_string())`.
pub trait Entity:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Key: Clone + fmt::Display + FromStr + Eq + fmt::Debug + Send + Sync;

    const KIND: &'static str;

    fn key(&self) -> &Self::Key;
}

/// A template from which instance group managers are created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceTemplate {
    pub key: TemplateKey,
    /// Revisions of this template that are drained.
    #[serde(default)]
    pub drained: BTreeSet<RevisionKey>,
}

impl InstanceTemplate {
    pub fn new(key: TemplateKey) -> Self {
        Self {
            key,
            drained: BTreeSet::new(),
        }
    }
}

/// One revision of an instance template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceTemplateRevision {
    pub key: RevisionKey,
    /// Cloud project the revision's instance groups live in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Instance group managers of this revision that are drained.
    #[serde(default)]
    pub drained: BTreeSet<ManagerKey>,
}

impl InstanceTemplateRevision {
    pub fn new(key: RevisionKey, project: impl Into<String>) -> Self {
        Self {
            key,
            project: Some(project.into()),
            drained: BTreeSet::new(),
        }
    }

    /// The project, treating an empty string as unset.
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref().filter(|p| !p.is_empty())
    }
}

/// A cloud-managed pool of instances for one revision in one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceGroupManager {
    pub key: ManagerKey,
    /// URL of the cloud instance group manager, once it has been created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Instances last reported by the cloud provider, in report order.
    #[serde(default)]
    pub instances: Vec<InstanceKey>,
}

impl InstanceGroupManager {
    pub fn new(key: ManagerKey) -> Self {
        Self {
            key,
            url: None,
            instances: Vec::new(),
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }
}

/// A pending change to an instance's cloud metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetadataUpdate {
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// One cloud VM belonging to an instance group manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub key: InstanceKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub hostname: String,
    pub instance_group_manager: ManagerKey,
    #[serde(default)]
    pub pending_deletion: bool,
    /// When the deletion RPC was accepted. Set at most once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_ts: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_expiration_ts: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cataloged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubsub_subscription: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubsub_service_account: Option<String>,
    #[serde(default)]
    pub pending_metadata_updates: Vec<MetadataUpdate>,
}

impl Instance {
    /// A freshly discovered instance of `instance_group_manager`.
    pub fn new(key: InstanceKey, url: impl Into<String>, instance_group_manager: ManagerKey) -> Self {
        Self {
            hostname: key.instance_name().to_string(),
            key,
            url: Some(url.into()),
            instance_group_manager,
            pending_deletion: false,
            deletion_ts: None,
            lease_expiration_ts: None,
            cataloged: false,
            pubsub_subscription: None,
            pubsub_service_account: None,
            pending_metadata_updates: Vec::new(),
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }
}

impl Entity for InstanceTemplate {
    type Key = TemplateKey;
    const KIND: &'static str = "InstanceTemplate";

    fn key(&self) -> &TemplateKey {
        &self.key
    }
}

impl Entity for InstanceTemplateRevision {
    type Key = RevisionKey;
    const KIND: &'static str = "InstanceTemplateRevision";

    fn key(&self) -> &RevisionKey {
        &self.key
    }
}

impl Entity for InstanceGroupManager {
    type Key = ManagerKey;
    const KIND: &'static str = "InstanceGroupManager";

    fn key(&self) -> &ManagerKey {
        &self.key
    }
}

impl Entity for Instance {
    type Key = InstanceKey;
    const KIND: &'static str = "Instance";

    fn key(&self) -> &InstanceKey {
        &self.key
    }
}

/// Machine lifecycle events reported to the event sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineEvent {
    Created,
    DeletionProposed,
    DeletionScheduled,
    DeletionSucceeded,
}

impl MachineEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::DeletionProposed => "DELETION_PROPOSED",
            Self::DeletionScheduled => "DELETION_SCHEDULED",
            Self::DeletionSucceeded => "DELETION_SUCCEEDED",
        }
    }
}

impl fmt::Display for MachineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
