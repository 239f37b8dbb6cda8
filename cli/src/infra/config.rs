//! YAML configuration file and environment-provided credentials.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::config::ReconcilerConfig;

/// Environment variable naming an alternate configuration file.
pub const CONFIG_ENV: &str = "GCE_BACKEND_CONFIG";
/// Prefix of the environment variables read into [`Credentials`].
pub const ENV_PREFIX: &str = "GCE_BACKEND_";

/// Loads `ReconcilerConfig` from a YAML file on disk.
pub struct YamlConfigStore {
    path_override: Option<PathBuf>,
}

impl YamlConfigStore {
    /// `path_override` (from `--config`) takes precedence over
    /// `$GCE_BACKEND_CONFIG` and the default location.
    #[must_use]
    pub fn new(path_override: Option<PathBuf>) -> Self {
        Self { path_override }
    }

    /// Resolved configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path_override {
            return Ok(path.clone());
        }
        if let Ok(val) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(val));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.join(".gce-backend").join("config.yaml"))
    }

    /// Load and validate the configuration. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds an
    /// invalid value.
    pub fn load(&self) -> Result<ReconcilerConfig> {
        let path = self.path()?;
        let config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            if content.trim().is_empty() {
                ReconcilerConfig::default()
            } else {
                serde_yaml::from_str(&content)
                    .with_context(|| format!("cannot parse {}", path.display()))?
            }
        } else {
            ReconcilerConfig::default()
        };
        config
            .validate()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

/// Secrets read from `GCE_BACKEND_*` environment variables.
///
///   - `GCE_BACKEND_ACCESS_TOKEN` (optional, OAuth2 bearer token for the
///     compute API)
#[derive(Default, Deserialize)]
pub struct Credentials {
    pub access_token: Option<String>,
}

impl Credentials {
    /// # Errors
    ///
    /// Returns an error if a variable holds a value of the wrong shape.
    pub fn from_env() -> Result<Self> {
        envy::prefixed(ENV_PREFIX)
            .from_env()
            .with_context(|| format!("failed to load credentials from {ENV_PREFIX}* env vars"))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
