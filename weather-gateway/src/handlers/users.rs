//! Identity and assignment management. Every route requires `user_management`.

use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::StatusCode,
};
use gateway_core::error::AppError;
use serde_json::Value;
use validator::Validate;

use super::json_input;
use crate::middleware::CurrentIdentity;
use crate::models::{Capability, IdentityChanges, IdentityRequest};
use crate::services::{translate, PermissionGate};
use crate::AppState;

/// POST /users
pub async fn add_user(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    req: Result<Json<IdentityRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    PermissionGate::authorize(&caller, Capability::UserManagement)?;
    let req = json_input(req)?;
    req.validate()?;

    tracing::info!(caller = %caller.user_id, user_id = %req.user_id, "Adding user");
    let result = state.directory.add_identity(req).await?;

    Ok((StatusCode::CREATED, Json(translate(result)?)))
}

/// PUT /users/{user_id}
pub async fn edit_user(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    Path(user_id): Path<String>,
    changes: Result<Json<IdentityChanges>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    PermissionGate::authorize(&caller, Capability::UserManagement)?;
    let req = json_input(changes)?.into_request(user_id);
    req.validate()?;

    tracing::info!(caller = %caller.user_id, user_id = %req.user_id, "Updating user");
    let result = state.directory.edit_identity(req).await?;

    Ok(Json(translate(result)?))
}

/// DELETE /users/{user_id}
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    PermissionGate::authorize(&caller, Capability::UserManagement)?;

    tracing::info!(caller = %caller.user_id, user_id = %user_id, "Deleting user");
    let result = state.directory.delete_identity(&user_id).await?;

    Ok(Json(translate(result)?))
}

/// POST /users/{user_id}/permissions/{permission_id}
pub async fn add_permission(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    Path((user_id, permission_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    PermissionGate::authorize(&caller, Capability::UserManagement)?;

    tracing::info!(
        caller = %caller.user_id,
        user_id = %user_id,
        permission_id = %permission_id,
        "Granting permission"
    );
    let result = state
        .directory
        .add_assignment(&user_id, &permission_id)
        .await?;

    Ok((StatusCode::CREATED, Json(translate(result)?)))
}

/// DELETE /users/{user_id}/permissions/{permission_id}
pub async fn remove_permission(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    Path((user_id, permission_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    PermissionGate::authorize(&caller, Capability::UserManagement)?;

    tracing::info!(
        caller = %caller.user_id,
        user_id = %user_id,
        permission_id = %permission_id,
        "Revoking permission"
    );
    let result = state
        .directory
        .remove_assignment(&user_id, &permission_id)
        .await?;

    Ok(Json(translate(result)?))
}
