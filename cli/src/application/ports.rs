//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and the shared entity types,
//! never from `crate::infra` or `crate::commands`.

use std::fmt;

use anyhow::Result;
use gce_backend_common::{Entity, InstanceKey, MachineEvent, ManagerKey};
use serde::{Deserialize, Serialize};

use crate::domain::ComputeError;

// ── Value Types ───────────────────────────────────────────────────────────────

/// One page of `instanceGroups.listInstances`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceGroupPage {
    #[serde(default)]
    pub items: Vec<InstanceReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// A member of an instance group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceReference {
    /// Full URL of the instance.
    pub instance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A long-running compute operation as returned by mutating calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl Operation {
    pub const DONE: &'static str = "DONE";

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == Self::DONE
    }
}

/// A unit of out-of-band work handed to the task dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Task {
    /// Discover the instances of one group and ensure their records exist.
    FetchInstances(ManagerKey),
    /// Delete an instance that was marked for deletion.
    DeletePending(InstanceKey),
    /// Delete an instance whose group is drained.
    DeleteDrained(InstanceKey),
}

impl Task {
    /// Name of the handler that executes this task.
    #[must_use]
    pub fn handler_name(&self) -> &'static str {
        match self {
            Self::FetchInstances(_) => "fetch-instances",
            Self::DeletePending(_) => "delete-instance-pending-deletion",
            Self::DeleteDrained(_) => "delete-drained-instance",
        }
    }

    /// Textual key of the entity the task operates on.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::FetchInstances(key) => key.to_string(),
            Self::DeletePending(key) | Self::DeleteDrained(key) => key.to_string(),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.handler_name(), self.key())
    }
}

// ── Entity Store Port ─────────────────────────────────────────────────────────

/// Transactional key-value store holding the entity hierarchy.
#[allow(async_fn_in_trait)]
pub trait EntityStore {
    /// Point read outside any transaction.
    async fn get<E: Entity>(&self, key: &E::Key) -> Result<Option<E>>;

    /// Scan every record of one kind.
    async fn query<E: Entity>(&self) -> Result<Vec<E>>;

    /// Single-key read-modify-write.
    ///
    /// `mutate` receives the current record (or `None`) and may replace,
    /// edit, or create it. The store writes only when the record changed,
    /// and may call `mutate` more than once when a concurrent writer
    /// commits first. The value returned by the final call is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot commit.
    async fn transact<E, R, F>(&self, key: &E::Key, mutate: F) -> Result<R>
    where
        E: Entity,
        F: FnMut(&mut Option<E>) -> R;
}

// ── Compute Port ──────────────────────────────────────────────────────────────

/// Compute control plane operations on managed instance groups.
#[allow(async_fn_in_trait)]
pub trait ComputeApi {
    /// List one page of the instances in `group`.
    async fn list_instances_in_group(
        &self,
        project: &str,
        group: &str,
        zone: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<InstanceGroupPage, ComputeError>;

    /// Ask the group manager to delete the given instance URLs.
    async fn delete_instances(
        &self,
        project: &str,
        group: &str,
        zone: &str,
        urls: &[String],
    ) -> Result<Operation, ComputeError>;
}

// ── Task Dispatch Port ────────────────────────────────────────────────────────

/// Accepts tasks for asynchronous, at-least-once execution.
#[allow(async_fn_in_trait)]
pub trait TaskDispatcher {
    /// Hand off a task. Returns once the task is queued, not executed.
    async fn enqueue(&self, task: Task) -> Result<()>;
}

// ── Event Port ────────────────────────────────────────────────────────────────

/// Receives machine lifecycle events. Sync trait.
pub trait EventSink {
    fn send_event(&self, event: MachineEvent, hostname: &str);
}
