//! Canned adapters and store seeding shared by the integration tests.

#![allow(clippy::expect_used, clippy::unwrap_used, dead_code)]

use std::sync::Mutex;

use gce_backend::application::ports::{
    ComputeApi, EventSink, InstanceGroupPage, InstanceReference, Operation,
};
use gce_backend::domain::ComputeError;
use gce_backend_common::{
    InstanceGroupManager, InstanceTemplate, InstanceTemplateRevision, MachineEvent, ManagerKey,
};

pub const PROJECT: &str = "proj";

pub fn manager_key() -> ManagerKey {
    ManagerKey::from_parts("base", "rev", "zone").expect("valid key")
}

pub fn instance_url(name: &str) -> String {
    format!("https://www.googleapis.com/compute/v1/projects/{PROJECT}/zones/zone/instances/{name}")
}

/// Compute API serving one fixed page of instances.
pub struct CannedCompute {
    urls: Vec<String>,
    list_status: Option<u16>,
    delete_status: Result<&'static str, u16>,
    pub deleted: Mutex<Vec<Vec<String>>>,
}

impl CannedCompute {
    pub fn listing(names: &[&str]) -> Self {
        Self {
            urls: names.iter().map(|name| instance_url(name)).collect(),
            list_status: None,
            delete_status: Ok(Operation::DONE),
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Every list call fails with `status`.
    pub fn failing(status: u16) -> Self {
        Self {
            list_status: Some(status),
            ..Self::listing(&[])
        }
    }

    /// Delete calls fail with `status`.
    pub fn rejecting_deletes(mut self, status: u16) -> Self {
        self.delete_status = Err(status);
        self
    }

    pub fn deleted_urls(&self) -> Vec<String> {
        self.deleted.lock().unwrap().iter().flatten().cloned().collect()
    }
}

impl ComputeApi for CannedCompute {
    async fn list_instances_in_group(
        &self,
        _project: &str,
        _group: &str,
        _zone: &str,
        _page_size: u32,
        _page_token: Option<&str>,
    ) -> Result<InstanceGroupPage, ComputeError> {
        if let Some(status) = self.list_status {
            return Err(ComputeError::Http {
                status,
                message: "backend error".to_string(),
            });
        }
        Ok(InstanceGroupPage {
            items: self
                .urls
                .iter()
                .map(|url| InstanceReference {
                    instance: url.clone(),
                    status: Some("RUNNING".to_string()),
                })
                .collect(),
            next_page_token: None,
        })
    }

    async fn delete_instances(
        &self,
        _project: &str,
        _group: &str,
        _zone: &str,
        urls: &[String],
    ) -> Result<Operation, ComputeError> {
        self.deleted.lock().unwrap().push(urls.to_vec());
        match self.delete_status {
            Ok(status) => Ok(Operation {
                name: Some("operation-1".to_string()),
                status: status.to_string(),
                target_link: None,
                error: None,
            }),
            Err(status) => Err(ComputeError::Http {
                status,
                message: "rejected".to_string(),
            }),
        }
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<(MachineEvent, String)>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<(MachineEvent, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: MachineEvent) -> usize {
        self.events().iter().filter(|(e, _)| *e == event).count()
    }
}

impl EventSink for RecordingEvents {
    fn send_event(&self, event: MachineEvent, hostname: &str) {
        self.events
            .lock()
            .unwrap()
            .push((event, hostname.to_string()));
    }
}

/// Template, revision and manager records for [`manager_key`].
pub fn chain() -> (InstanceTemplate, InstanceTemplateRevision, InstanceGroupManager) {
    let key = manager_key();
    let template = InstanceTemplate::new(key.parent().parent().clone());
    let revision = InstanceTemplateRevision::new(key.parent().clone(), PROJECT);
    let mut manager = InstanceGroupManager::new(key);
    manager.url = Some(format!(
        "https://www.googleapis.com/compute/v1/projects/{PROJECT}/zones/zone/instanceGroupManagers/base-rev"
    ));
    (template, revision, manager)
}
