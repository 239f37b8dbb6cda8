//! Application services: instance reconciliation use cases.
//!
//! Each service module composes domain rules with port trait calls. Services
//! import only from `crate::domain` and `crate::application::ports`, never
//! from `crate::infra` or `crate::commands`.

pub mod deletion;
pub mod discovery;
pub mod instance_state;
pub mod schedule;
pub mod tasks;


/// What a single-record transaction did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// The record does not exist; nothing was written.
    Missing,
    /// The record already had the requested state.
    Unchanged,
    /// The record was written.
    Updated,
}

impl Mutation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Unchanged => "unchanged",
            Self::Updated => "updated",
        }
    }
}
