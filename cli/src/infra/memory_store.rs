//! In-memory implementation of the `EntityStore` port.
//!
//! Records are held as JSON values per `(kind, id)` with a version counter.
//! Transactions are optimistic: read the record and its version, run the
//! mutation on a copy, and commit only if the version is still the same.
//! A lost race re-runs the mutation against the winner's record.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use gce_backend_common::Entity;
use tokio::sync::RwLock;

use crate::application::ports::EntityStore;
use crate::domain::StoreError;

/// Retries after the first conflicting commit before giving up.
pub const TRANSACTION_RETRIES: usize = 3;

/// Serialized store contents: kind → id → record.
pub type Snapshot = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

#[derive(Debug, Clone)]
struct Versioned {
    version: u64,
    value: serde_json::Value,
}

/// Outcome of a transaction, with whether a write was committed.
#[derive(Debug)]
pub struct Committed<R> {
    pub value: R,
    pub wrote: bool,
}

/// Volatile entity store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<String, BTreeMap<String, Versioned>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding the records of `snapshot`.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let tables = snapshot
            .into_iter()
            .map(|(kind, records)| {
                let records = records
                    .into_iter()
                    .map(|(id, value)| (id, Versioned { version: 1, value }))
                    .collect();
                (kind, records)
            })
            .collect();
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Copy out every record.
    pub async fn snapshot(&self) -> Snapshot {
        self.tables
            .read()
            .await
            .iter()
            .map(|(kind, records)| {
                let records = records
                    .iter()
                    .map(|(id, record)| (id.clone(), record.value.clone()))
                    .collect();
                (kind.clone(), records)
            })
            .collect()
    }

    /// Unconditionally write `entity`, replacing any existing record.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity cannot be serialized.
    pub async fn put<E: Entity>(&self, entity: &E) -> Result<()> {
        let value = serde_json::to_value(entity)
            .with_context(|| format!("serializing {} '{}'", E::KIND, entity.key()))?;
        let mut tables = self.tables.write().await;
        let record = tables
            .entry(E::KIND.to_string())
            .or_default()
            .entry(entity.key().to_string())
            .or_insert(Versioned {
                version: 0,
                value: serde_json::Value::Null,
            });
        record.version += 1;
        record.value = value;
        Ok(())
    }

    /// Transaction that also reports whether it wrote.
    ///
    /// # Errors
    ///
    /// Returns an error on a corrupt record, a key mismatch, or when every
    /// attempt loses to a concurrent writer.
    pub async fn transact_committed<E, R, F>(
        &self,
        key: &E::Key,
        mut mutate: F,
    ) -> Result<Committed<R>>
    where
        E: Entity,
        F: FnMut(&mut Option<E>) -> R,
    {
        let id = key.to_string();
        for attempt in 0..=TRANSACTION_RETRIES {
            let (version, current) = self.read_versioned::<E>(&id).await?;
            let mut next = current.clone();
            let value = mutate(&mut next);
            if next == current {
                return Ok(Committed {
                    value,
                    wrote: false,
                });
            }
            let Some(record) = next else {
                anyhow::bail!("removing {} '{id}' is not supported", E::KIND);
            };
            if record.key() != key {
                return Err(StoreError::KeyMismatch {
                    kind: E::KIND,
                    id,
                    found: record.key().to_string(),
                }
                .into());
            }
            if self.commit_if_unchanged(&id, version, &record).await? {
                return Ok(Committed { value, wrote: true });
            }
            tracing::debug!(kind = E::KIND, id = %id, attempt, "transaction conflict, retrying");
        }
        Err(StoreError::Contention {
            kind: E::KIND,
            id,
            attempts: TRANSACTION_RETRIES + 1,
        }
        .into())
    }

    /// Read a record together with its version (0 when absent).
    async fn read_versioned<E: Entity>(&self, id: &str) -> Result<(u64, Option<E>)> {
        let tables = self.tables.read().await;
        let Some(record) = tables.get(E::KIND).and_then(|records| records.get(id)) else {
            return Ok((0, None));
        };
        let entity = decode::<E>(id, &record.value)?;
        Ok((record.version, Some(entity)))
    }

    /// Write `entity` only if its record is still at `expected` version.
    async fn commit_if_unchanged<E: Entity>(
        &self,
        id: &str,
        expected: u64,
        entity: &E,
    ) -> Result<bool> {
        let value = serde_json::to_value(entity)
            .with_context(|| format!("serializing {} '{id}'", E::KIND))?;
        let mut tables = self.tables.write().await;
        let records = tables.entry(E::KIND.to_string()).or_default();
        let version = records.get(id).map_or(0, |record| record.version);
        if version != expected {
            return Ok(false);
        }
        records.insert(
            id.to_string(),
            Versioned {
                version: version + 1,
                value,
            },
        );
        Ok(true)
    }
}

fn decode<E: Entity>(id: &str, value: &serde_json::Value) -> Result<E> {
    serde_json::from_value(value.clone()).map_err(|e| {
        StoreError::Corrupt {
            kind: E::KIND,
            id: id.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

impl EntityStore for MemoryStore {
    async fn get<E: Entity>(&self, key: &E::Key) -> Result<Option<E>> {
        let (_, entity) = self.read_versioned::<E>(&key.to_string()).await?;
        Ok(entity)
    }

    async fn query<E: Entity>(&self) -> Result<Vec<E>> {
        let tables = self.tables.read().await;
        let Some(records) = tables.get(E::KIND) else {
            return Ok(Vec::new());
        };
        records
            .iter()
            .map(|(id, record)| decode::<E>(id, &record.value))
            .collect()
    }

    async fn transact<E, R, F>(&self, key: &E::Key, mutate: F) -> Result<R>
    where
        E: Entity,
        F: FnMut(&mut Option<E>) -> R,
    {
        Ok(self.transact_committed(key, mutate).await?.value)
    }
}
