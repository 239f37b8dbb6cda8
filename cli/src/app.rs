//! Application context: the adapters and settings shared by command handlers.
//!
//! `AppContext` is built once per invocation from the top-level CLI flags and
//! passed as `&AppContext` to every command that touches the entity store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::application::ports::Task;
use crate::application::services::tasks;
use crate::domain::config::ReconcilerConfig;
use crate::infra::config::{Credentials, YamlConfigStore};
use crate::infra::dispatcher::{DrainReport, QueueDispatcher};
use crate::infra::events::TracingEventSink;
use crate::infra::file_store::JsonFileStore;

#[cfg(feature = "gce")]
pub type Compute = crate::infra::compute::GceComputeClient;
#[cfg(not(feature = "gce"))]
pub type Compute = offline::OfflineCompute;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Flags passed from the top-level CLI.
pub struct AppFlags {
    pub config: Option<PathBuf>,
    pub store: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

impl AppFlags {
    #[must_use]
    pub fn config_store(&self) -> YamlConfigStore {
        YamlConfigStore::new(self.config.clone())
    }

    #[must_use]
    pub fn mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

/// Unified application context passed to command handlers.
pub struct AppContext {
    pub config: ReconcilerConfig,
    pub store: JsonFileStore,
    pub compute: Compute,
    pub dispatcher: QueueDispatcher,
    pub events: TracingEventSink,
    pub mode: OutputMode,
    pub quiet: bool,
}

impl AppContext {
    /// Load configuration and credentials, open the store and build the
    /// compute client.
    ///
    /// # Errors
    ///
    /// Returns an error if any of them cannot be loaded.
    pub async fn new(flags: &AppFlags) -> Result<Self> {
        let config = flags.config_store().load()?;
        let credentials = Credentials::from_env()?;

        let store_path = match flags.store.clone().or_else(|| config.store.path.clone()) {
            Some(path) => path,
            None => JsonFileStore::default_path()?,
        };
        let store = JsonFileStore::open(store_path.clone())
            .await
            .with_context(|| format!("cannot open entity store {}", store_path.display()))?;

        let compute = new_compute(&config, credentials)?;
        let dispatcher = QueueDispatcher::new(config.dispatcher.clone());

        Ok(Self {
            config,
            store,
            compute,
            dispatcher,
            events: TracingEventSink,
            mode: flags.mode(),
            quiet: flags.quiet,
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Print `value` as JSON, or the `human` line unless `--quiet`.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce() -> String) -> Result<()> {
        if self.is_json() {
            println!(
                "{}",
                serde_json::to_string_pretty(value).context("JSON serialization failed")?
            );
        } else if !self.quiet {
            println!("{}", human());
        }
        Ok(())
    }

    /// Run one task against this context's adapters.
    ///
    /// # Errors
    ///
    /// Returns the task handler's error.
    pub async fn execute(&self, task: &Task) -> Result<()> {
        tasks::execute(
            &self.store,
            &self.compute,
            &self.events,
            &self.config.discovery,
            task,
        )
        .await
    }

    /// Execute every queued task, redeliveries included.
    pub async fn drain(&self) -> DrainReport {
        self.dispatcher
            .drain(move |task| async move { self.execute(&task).await })
            .await
    }
}

#[cfg(feature = "gce")]
fn new_compute(config: &ReconcilerConfig, credentials: Credentials) -> Result<Compute> {
    crate::infra::compute::GceComputeClient::new(&config.compute, credentials.access_token)
        .context("cannot build compute API client")
}

#[cfg(not(feature = "gce"))]
fn new_compute(_config: &ReconcilerConfig, _credentials: Credentials) -> Result<Compute> {
    Ok(offline::OfflineCompute)
}

#[cfg(not(feature = "gce"))]
mod offline {
    use crate::application::ports::{ComputeApi, InstanceGroupPage, Operation};
    use crate::domain::ComputeError;

    /// Stand-in used when the binary is built without the `gce` feature.
    pub struct OfflineCompute;

    fn disabled() -> ComputeError {
        ComputeError::Transport("built without the `gce` feature".to_string())
    }

    impl ComputeApi for OfflineCompute {
        async fn list_instances_in_group(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: u32,
            _: Option<&str>,
        ) -> Result<InstanceGroupPage, ComputeError> {
            Err(disabled())
        }

        async fn delete_instances(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: &[String],
        ) -> Result<Operation, ComputeError> {
            Err(disabled())
        }
    }
}
