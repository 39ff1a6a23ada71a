//! Domain layer for Crosswire policies.

pub mod model;
pub mod resource;
pub mod service;
pub mod validation;

pub use model::{ConditionModel, EntitlementModel, PolicyResourceModel, UserModel};
pub use resource::{PolicyResource, RESOURCE_TYPE, validate_config};
pub use service::Service;
pub use validation::validate_policy;
