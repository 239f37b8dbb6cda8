//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod drain;
pub mod error;

pub use config::ReconcilerConfig;
pub use drain::{awaits_drained_deletion, awaits_pending_deletion, drained_managers, is_drained};
pub use error::{ComputeError, ConfigError, StoreError};
