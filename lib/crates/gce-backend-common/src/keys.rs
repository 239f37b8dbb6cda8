//! Typed keys for the entity hierarchy
//!
//! InstanceTemplate → InstanceTemplateRevision → InstanceGroupManager → Instance
//!
//! Each child key owns its parent key, so walking up the chain never parses
//! strings. The textual form joins every component with a single space:
//!
//!   template:  "{base_name}"
//!   revision:  "{base_name} {revision}"
//!   manager:   "{base_name} {revision} {zone}"
//!   instance:  "{base_name} {revision} {zone} {instance_name}"
//!
//! The textual form is what the store uses as the entity id and what the
//! CLI accepts. Components must be non-empty and free of whitespace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors raised while building or parsing a key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid key component '{0}': must be non-empty and contain no whitespace")]
    InvalidComponent(String),

    #[error("{kind} key needs {expected} space-separated components, got {found}: '{raw}'")]
    WrongArity {
        kind: &'static str,
        expected: usize,
        found: usize,
        raw: String,
    },
}

fn component(value: impl Into<String>) -> Result<String, KeyError> {
    let value = value.into();
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(KeyError::InvalidComponent(value));
    }
    Ok(value)
}

fn split_exact<'a>(
    kind: &'static str,
    raw: &'a str,
    expected: usize,
) -> Result<Vec<&'a str>, KeyError> {
    let parts: Vec<&str> = raw.split_whitespace().collect();
    if parts.len() != expected {
        return Err(KeyError::WrongArity {
            kind,
            expected,
            found: parts.len(),
            raw: raw.to_string(),
        });
    }
    Ok(parts)
}

// ── InstanceTemplate ─────────────────────────────────────────────────────────

/// Key of an `InstanceTemplate`: the template base name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TemplateKey {
    base_name: String,
}

impl TemplateKey {
    pub fn new(base_name: impl Into<String>) -> Result<Self, KeyError> {
        Ok(Self {
            base_name: component(base_name)?,
        })
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Key of a revision of this template.
    pub fn revision(&self, revision: impl Into<String>) -> Result<RevisionKey, KeyError> {
        Ok(RevisionKey {
            template: self.clone(),
            revision: component(revision)?,
        })
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_name)
    }
}

impl FromStr for TemplateKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_exact("template", s, 1)?;
        Self::new(parts[0])
    }
}

// ── InstanceTemplateRevision ─────────────────────────────────────────────────

/// Key of an `InstanceTemplateRevision`, child of a template.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RevisionKey {
    template: TemplateKey,
    revision: String,
}

impl RevisionKey {
    pub fn parent(&self) -> &TemplateKey {
        &self.template
    }

    pub fn base_name(&self) -> &str {
        self.template.base_name()
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// Key of the instance group manager for this revision in `zone`.
    pub fn manager(&self, zone: impl Into<String>) -> Result<ManagerKey, KeyError> {
        Ok(ManagerKey {
            revision: self.clone(),
            zone: component(zone)?,
        })
    }
}

impl fmt::Display for RevisionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.template, self.revision)
    }
}

impl FromStr for RevisionKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_exact("revision", s, 2)?;
        TemplateKey::new(parts[0])?.revision(parts[1])
    }
}

// ── InstanceGroupManager ─────────────────────────────────────────────────────

/// Key of an `InstanceGroupManager`, child of a revision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManagerKey {
    revision: RevisionKey,
    zone: String,
}

impl ManagerKey {
    /// Build a manager key from its three components.
    pub fn from_parts(
        base_name: impl Into<String>,
        revision: impl Into<String>,
        zone: impl Into<String>,
    ) -> Result<Self, KeyError> {
        TemplateKey::new(base_name)?.revision(revision)?.manager(zone)
    }

    pub fn parent(&self) -> &RevisionKey {
        &self.revision
    }

    pub fn base_name(&self) -> &str {
        self.revision.base_name()
    }

    pub fn revision(&self) -> &str {
        self.revision.revision()
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Name of the cloud instance group managed by this entity.
    pub fn group_name(&self) -> String {
        format!("{}-{}", self.base_name(), self.revision())
    }

    /// Key of the instance named `instance_name` in this group.
    pub fn instance(&self, instance_name: impl Into<String>) -> Result<InstanceKey, KeyError> {
        Ok(InstanceKey {
            manager: self.clone(),
            instance_name: component(instance_name)?,
        })
    }
}

impl fmt::Display for ManagerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.revision, self.zone)
    }
}

impl FromStr for ManagerKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_exact("manager", s, 3)?;
        Self::from_parts(parts[0], parts[1], parts[2])
    }
}

// ── Instance ─────────────────────────────────────────────────────────────────

/// Key of an `Instance`, child of an instance group manager.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceKey {
    manager: ManagerKey,
    instance_name: String,
}

impl InstanceKey {
    /// Build an instance key from all four components.
    pub fn from_parts(
        base_name: impl Into<String>,
        revision: impl Into<String>,
        zone: impl Into<String>,
        instance_name: impl Into<String>,
    ) -> Result<Self, KeyError> {
        ManagerKey::from_parts(base_name, revision, zone)?.instance(instance_name)
    }

    pub fn parent(&self) -> &ManagerKey {
        &self.manager
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.manager, self.instance_name)
    }
}

impl FromStr for InstanceKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_exact("instance", s, 4)?;
        Self::from_parts(parts[0], parts[1], parts[2], parts[3])
    }
}

// ── serde: keys travel as their textual form ─────────────────────────────────

macro_rules! impl_string_serde {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(self)
                }
            }

            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    let raw = String::deserialize(deserializer)?;
                    raw.parse().map_err(serde::de::Error::custom)
                }
            }
        )*
    };
}

impl_string_serde!(TemplateKey, RevisionKey, ManagerKey, InstanceKey);
