//! Domain models for the weather gateway.

pub mod capability;
pub mod identity;
pub mod job;
pub mod operation;

pub use capability::{Capability, PermissionCatalog};
pub use identity::{Identity, IdentityChanges, IdentityRecord, IdentityRequest};
pub use job::{City, HyperParams, HyperParamsById, RetrainQuery, TrainQuery};
pub use operation::OperationResult;
