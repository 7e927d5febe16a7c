use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::JwtConfig;
use crate::models::Identity;
use crate::services::{IdentityStore, ServiceError};
use crate::utils::{CredentialHasher, Password};

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Token returned by `POST /token`.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Issues and validates HS256 bearer tokens and resolves them back to identities.
///
/// Tokens are stateless: a token is valid while its signature checks out against the
/// process secret and `exp` is in the future. The identity behind it is loaded from the
/// store on every `resolve`, so capability changes apply to the next request.
#[derive(Clone)]
pub struct TokenAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    default_ttl: Duration,
    store: Arc<dyn IdentityStore>,
    hasher: Arc<dyn CredentialHasher>,
}

impl TokenAuthenticator {
    pub fn new(
        config: &JwtConfig,
        store: Arc<dyn IdentityStore>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        let secret = config.secret.expose_secret().as_bytes();

        tracing::info!(
            ttl_minutes = config.access_token_expiry_minutes,
            "Token authenticator initialized with HS256"
        );

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            default_ttl: Duration::minutes(config.access_token_expiry_minutes),
            store,
            hasher,
        }
    }

    /// Configured lifetime of tokens issued at login.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Verify a username/secret pair against the stored credential hash.
    ///
    /// Unknown users, inactive users and wrong secrets all produce the same error.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &Password,
    ) -> Result<Identity, ServiceError> {
        let record = match self.store.find_identity(username).await? {
            Some(record) => record,
            None => {
                tracing::info!(user_id = %username, "Login rejected: unknown user");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        if !record.active {
            tracing::info!(user_id = %username, "Login rejected: inactive user");
            return Err(ServiceError::InvalidCredentials);
        }

        if !self.hasher.verify(password, &record.credential_hash) {
            tracing::info!(user_id = %username, "Login rejected: wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        let capabilities = self.store.capabilities_of(&record.user_id).await?;
        Ok(Identity::from_record(record, capabilities))
    }

    /// Sign a token for `identity` that expires `ttl` from now.
    pub fn issue_token(&self, identity: &Identity, ttl: Duration) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: identity.user_id.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Check signature and expiry. Pure computation, no store access.
    pub fn decode(&self, token: &str) -> Result<AccessTokenClaims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                ServiceError::InvalidToken
            })
    }

    /// Recover the calling identity and its current capabilities from a bearer token.
    pub async fn resolve(&self, token: &str) -> Result<Identity, ServiceError> {
        let claims = self.decode(token)?;

        let record = self
            .store
            .find_identity(&claims.sub)
            .await?
            .ok_or_else(|| {
                tracing::info!(user_id = %claims.sub, "Token subject no longer exists");
                ServiceError::InvalidToken
            })?;

        let capabilities = self.store.capabilities_of(&record.user_id).await?;
        Ok(Identity::from_record(record, capabilities))
    }
}
