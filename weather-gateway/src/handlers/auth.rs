//! Login and caller introspection.

use axum::{
    extract::{Form, State},
    Json,
};
use gateway_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::middleware::CurrentIdentity;
use crate::models::Identity;
use crate::services::TokenResponse;
use crate::utils::Password;
use crate::AppState;

/// OAuth2 password-grant form posted to `/token`.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: Password,
    /// Accepted for client compatibility; only the password grant exists.
    #[serde(default)]
    pub grant_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: String,
    pub version: String,
}

/// GET /
pub async fn root(State(state): State<AppState>) -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: format!("Welcome to the {}", state.config.service_name),
        version: state.config.service_version.clone(),
    })
}

/// Exchange a username and password for a bearer token.
///
/// POST /token
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, AppError> {
    if let Some(grant_type) = form.grant_type.as_deref() {
        if grant_type != "password" {
            return Err(AppError::InvalidInput(format!(
                "Unsupported grant_type '{}'",
                grant_type
            )));
        }
    }

    let identity = match state
        .authenticator
        .authenticate(&form.username, &form.password)
        .await
    {
        Ok(identity) => identity,
        Err(e) => {
            metrics::counter!("login_attempts_total", "outcome" => "rejected").increment(1);
            return Err(e.into());
        }
    };

    let ttl = state.authenticator.default_ttl();
    let access_token = state.authenticator.issue_token(&identity, ttl)?;

    metrics::counter!("login_attempts_total", "outcome" => "accepted").increment(1);
    tracing::info!(user_id = %identity.user_id, "Access token issued");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: ttl.num_seconds(),
    }))
}

/// The caller's own identity and current capabilities.
///
/// GET /users/me
pub async fn who_am_i(CurrentIdentity(identity): CurrentIdentity) -> Json<Identity> {
    Json(identity)
}
