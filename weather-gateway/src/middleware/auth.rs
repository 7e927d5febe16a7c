use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::IntoResponse,
};
use gateway_core::error::AppError;

use crate::{models::Identity, services::ServiceError, AppState};

/// Middleware to require a valid bearer token.
///
/// The resolved identity, with the capabilities it holds right now, is stored in the
/// request extensions for [`CurrentIdentity`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ServiceError::InvalidToken)?;

    let identity = state.authenticator.resolve(token).await?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Extractor for the caller resolved by [`auth_middleware`].
pub struct CurrentIdentity(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts.extensions.get::<Identity>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Identity missing from request extensions"
            ))
        })?;

        Ok(CurrentIdentity(identity.clone()))
    }
}
