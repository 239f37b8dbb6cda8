//! Command handlers: one module per subcommand.

pub mod config;
pub mod delete;
pub mod fetch;
pub mod instance;
pub mod reconcile;
pub mod schedule;
pub mod version;
