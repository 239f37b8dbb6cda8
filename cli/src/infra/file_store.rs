//! JSON snapshot file implementation of the `EntityStore` port.
//!
//! `JsonFileStore` keeps a `MemoryStore` in memory and rewrites the whole
//! snapshot after every committed write, using `tokio::task::spawn_blocking`
//! and an atomic write (temp file + rename) to prevent corruption.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gce_backend_common::Entity;
use tokio::sync::Mutex;

use crate::application::ports::EntityStore;
use crate::infra::memory_store::{MemoryStore, Snapshot};

/// Entity store persisted to a JSON file.
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
    save_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Default snapshot location (`~/.gce-backend/store.json`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.join(".gce-backend").join("store.json"))
    }

    /// Load the snapshot at `path`; a missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let load_path = path.clone();
        let snapshot = tokio::task::spawn_blocking(move || load_sync(&load_path))
            .await
            .context("store load task panicked")??;
        tracing::debug!(path = %path.display(), kinds = snapshot.len(), "entity store loaded");
        Ok(Self {
            path,
            inner: MemoryStore::from_snapshot(snapshot),
            save_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unconditionally write `entity` and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity cannot be serialized or persisted.
    pub async fn put<E: Entity>(&self, entity: &E) -> Result<()> {
        self.inner.put(entity).await?;
        self.flush().await
    }

    /// Persist the current contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub async fn flush(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        let snapshot = self.inner.snapshot().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || save_sync(&path, &snapshot))
            .await
            .context("store save task panicked")?
    }
}

fn load_sync(path: &Path) -> Result<Snapshot> {
    if !path.exists() {
        return Ok(Snapshot::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading store file {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(Snapshot::new());
    }
    serde_json::from_str(&content).with_context(|| format!("parsing store file {}", path.display()))
}

fn save_sync(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .with_context(|| format!("creating directory {}", parent.display()))?;
    let content = serde_json::to_vec_pretty(snapshot).context("serializing store")?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("creating temp file in {}", parent.display()))?;
    temp.write_all(&content)
        .with_context(|| format!("writing temp file {}", temp.path().display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(temp.path(), std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("setting permissions on {}", temp.path().display()))?;
    }

    temp.persist(path)
        .with_context(|| format!("finalizing store file {}", path.display()))?;
    Ok(())
}

impl EntityStore for JsonFileStore {
    async fn get<E: Entity>(&self, key: &E::Key) -> Result<Option<E>> {
        self.inner.get(key).await
    }

    async fn query<E: Entity>(&self) -> Result<Vec<E>> {
        self.inner.query().await
    }

    async fn transact<E, R, F>(&self, key: &E::Key, mutate: F) -> Result<R>
    where
        E: Entity,
        F: FnMut(&mut Option<E>) -> R,
    {
        let outcome = self.inner.transact_committed(key, mutate).await?;
        if outcome.wrote {
            self.flush().await?;
        }
        Ok(outcome.value)
    }
}
