pub mod keys;
pub mod naming;
pub mod types;

pub use keys::{InstanceKey, KeyError, ManagerKey, RevisionKey, TemplateKey};
pub use naming::{extract_instance_name, full_subscription_name};
pub use types::*;
