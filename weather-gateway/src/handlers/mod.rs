//! HTTP handlers for the weather gateway.

pub mod admin;
pub mod auth;
pub mod jobs;
pub mod metrics;
pub mod users;

pub use admin::*;
pub use auth::*;
pub use jobs::*;
pub use users::*;

use axum::extract::{
    rejection::{JsonRejection, QueryRejection},
    Json, Query,
};
use gateway_core::error::AppError;

/// Unwrap a body extracted as `Result`, so handlers can authorize before rejecting it.
pub(crate) fn json_input<T>(extracted: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    extracted
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::InvalidInput(rejection.body_text()))
}

pub(crate) fn query_input<T>(
    extracted: Result<Query<T>, QueryRejection>,
) -> Result<T, AppError> {
    extracted
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::InvalidInput(rejection.body_text()))
}
