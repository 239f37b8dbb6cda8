//! Application layer: port trait definitions and use-case orchestration.
//!
//! This module depends only on `crate::domain` and the shared entity types,
//! never on `crate::infra` or `crate::commands`.

pub mod ports;
pub mod services;

pub use ports::{
    ComputeApi, EntityStore, EventSink, InstanceGroupPage, InstanceReference, Operation, Task,
    TaskDispatcher,
};
pub use services::Mutation;
