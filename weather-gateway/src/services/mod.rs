//! Services layer for the weather gateway.
//!
//! Token handling, the permission gate, the user directory and job dispatch to the
//! backend engines.

mod database;
mod directory;
mod dispatcher;
pub mod engines;
pub mod error;
mod gate;
mod logs;
pub mod metrics;
pub mod store;
mod token;
mod translator;

pub use database::PgIdentityStore;
pub use directory::UserDirectory;
pub use dispatcher::JobDispatcher;
pub use engines::{
    DataEngine, EngineCall, EngineClient, ForecastEngine, MockEngine, TrainingEngine,
};
pub use error::ServiceError;
pub use gate::PermissionGate;
pub use logs::LogReader;
pub use store::{IdentityStore, InMemoryIdentityStore, StoreError};
pub use token::{AccessTokenClaims, TokenAuthenticator, TokenResponse};
pub use translator::translate;
