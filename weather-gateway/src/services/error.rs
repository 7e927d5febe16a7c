use gateway_core::error::AppError;
use thiserror::Error;

use crate::services::store::StoreError;

/// Failure classes of the access-control core.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Wrong username/password, or an inactive account at login.
    #[error("Incorrect username or password")]
    InvalidCredentials,

    /// Any token problem: malformed, bad signature, expired, unknown subject.
    #[error("Could not validate credentials")]
    InvalidToken,

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// A backend collaborator reported a failure; the message is passed through.
    #[error("{0}")]
    Operation(String),

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            ServiceError::InvalidCredentials | ServiceError::InvalidToken
        )
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => ServiceError::Conflict(what),
            StoreError::Backend(e) => {
                tracing::error!(error = %e, "Identity store failure");
                ServiceError::Operation(e.to_string())
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidCredentials | ServiceError::InvalidToken => {
                AppError::AuthError(anyhow::anyhow!(err.to_string()))
            }
            ServiceError::Authorization(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            ServiceError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            ServiceError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            ServiceError::Operation(msg) => AppError::OperationFailed(msg),
            ServiceError::Validation(msg) => AppError::InvalidInput(msg),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
