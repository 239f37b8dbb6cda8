//! Infrastructure layer: adapters implementing the application ports.

#[cfg(feature = "gce")]
pub mod compute;
pub mod config;
pub mod dispatcher;
pub mod events;
pub mod file_store;
pub mod memory_store;
