//! Domain types and validators for reconciler configuration.
//!
//! Pure functions only; no I/O and no async.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

/// Largest page the compute API will return from a single list call.
pub const MAX_PAGE_SIZE: u32 = 500;
pub const DEFAULT_COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.gce-backend/config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub compute: ComputeConfig,
    pub discovery: DiscoveryConfig,
    pub schedule: ScheduleConfig,
    pub dispatcher: DispatcherConfig,
    pub store: StoreConfig,
}

/// Compute control API client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// Base URL of the compute REST API.
    pub endpoint: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_COMPUTE_ENDPOINT.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Instance discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Instances requested per list call.
    pub page_size: u32,
    /// Instance records created concurrently per group.
    pub max_concurrent: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            max_concurrent: 50,
        }
    }
}

/// Periodic trigger settings for `reconcile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub fetch_interval_secs: u64,
    pub deletion_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            fetch_interval_secs: 60,
            deletion_interval_secs: 60,
        }
    }
}

/// Local task dispatcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Tasks executed concurrently.
    pub concurrency: usize,
    /// Deliveries of one task before it is dropped.
    pub max_attempts: u32,
    /// Delay before the first redelivery; doubles on each further attempt.
    pub retry_delay_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            max_attempts: 5,
            retry_delay_ms: 1000,
        }
    }
}

/// Entity store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Snapshot file; `~/.gce-backend/store.json` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// ── Validators ───────────────────────────────────────────────────────────────

impl ReconcilerConfig {
    /// Check every bounded setting.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range value as a `ConfigError`.
    pub fn validate(&self) -> Result<()> {
        let page_size = self.discovery.page_size;
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(invalid(
                "discovery.page_size",
                page_size,
                &format!("1..={MAX_PAGE_SIZE}"),
            ));
        }
        if self.discovery.max_concurrent == 0 {
            return Err(invalid("discovery.max_concurrent", 0, "at least 1"));
        }
        if self.dispatcher.concurrency == 0 {
            return Err(invalid("dispatcher.concurrency", 0, "at least 1"));
        }
        if self.dispatcher.max_attempts == 0 {
            return Err(invalid("dispatcher.max_attempts", 0, "at least 1"));
        }
        if self.schedule.fetch_interval_secs == 0 {
            return Err(invalid("schedule.fetch_interval_secs", 0, "at least 1"));
        }
        if self.schedule.deletion_interval_secs == 0 {
            return Err(invalid("schedule.deletion_interval_secs", 0, "at least 1"));
        }
        if self.compute.endpoint.is_empty() {
            return Err(invalid("compute.endpoint", "\"\"", "a base URL"));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString, expected: &str) -> anyhow::Error {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
    .into()
}

// ── Unit tests ───────────────────────────────────────────────────────────────
