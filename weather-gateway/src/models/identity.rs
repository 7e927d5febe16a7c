//! Identity model - registered accounts and the requests that create or change them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use validator::{Validate, ValidationError};

use crate::models::Capability;
use crate::utils::Password;

/// Identity row as the store keeps it. The credential hash is opaque to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct IdentityRecord {
    pub user_id: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub active: bool,
    #[sqlx(rename = "pwd_hash")]
    pub credential_hash: String,
    pub created_utc: DateTime<Utc>,
}

/// A resolved caller: the identity row plus the capabilities currently assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub active: bool,
    pub capabilities: BTreeSet<Capability>,
}

impl Identity {
    pub fn from_record(record: IdentityRecord, capabilities: BTreeSet<Capability>) -> Self {
        Self {
            user_id: record.user_id,
            full_name: record.full_name,
            email: record.email,
            active: record.active,
            capabilities,
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Candidate identity for add and edit operations.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IdentityRequest {
    #[validate(
        length(min = 1, max = 64, message = "user_id must be 1-64 characters"),
        custom(function = "validate_user_id")
    )]
    pub user_id: String,

    #[validate(custom(function = "validate_password"))]
    pub password: Password,

    #[validate(length(max = 128))]
    pub full_name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[serde(default = "default_active")]
    pub active: bool,
}

/// Body of `PUT /users/{user_id}`; the identifier comes from the path.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityChanges {
    pub password: Password,
    pub full_name: Option<String>,
    pub email: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl IdentityChanges {
    pub fn into_request(self, user_id: String) -> IdentityRequest {
        IdentityRequest {
            user_id,
            password: self.password,
            full_name: self.full_name,
            email: self.email,
            active: self.active,
        }
    }
}

fn default_active() -> bool {
    true
}

/// Path segment that `GET /users/me` claims; an identity with this id could never be
/// edited or deleted through `/users/{user_id}`.
pub const RESERVED_USER_ID: &str = "me";

fn validate_user_id(user_id: &str) -> Result<(), ValidationError> {
    if user_id == RESERVED_USER_ID {
        let mut err = ValidationError::new("reserved_user_id");
        err.message = Some(format!("'{}' is reserved", RESERVED_USER_ID).into());
        return Err(err);
    }
    Ok(())
}

fn validate_password(password: &Password) -> Result<(), ValidationError> {
    if password.as_str().len() < 8 {
        let mut err = ValidationError::new("password_length");
        err.message = Some("Password must be at least 8 characters".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(password: &str) -> IdentityRequest {
        IdentityRequest {
            user_id: "alice".to_string(),
            password: Password::new(password.to_string()),
            full_name: None,
            email: Some("alice@margaux.example".to_string()),
            active: true,
        }
    }

    #[test]
    fn short_password_fails_validation() {
        assert!(request("short").validate().is_err());
        assert!(request("long-enough-secret").validate().is_ok());
    }

    #[test]
    fn me_is_not_a_valid_user_id() {
        let mut req = request("long-enough-secret");
        req.user_id = "me".to_string();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("user_id"));

        let mut req = request("long-enough-secret");
        req.user_id = "meteo".to_string();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn active_defaults_to_true() {
        let req: IdentityRequest =
            serde_json::from_str(r#"{"user_id":"bob","password":"correct horse"}"#).unwrap();
        assert!(req.active);
        assert_eq!(req.password.as_str(), "correct horse");
    }

    #[test]
    fn identity_serializes_without_credentials() {
        let record = IdentityRecord {
            user_id: "bob".to_string(),
            full_name: Some("Bob".to_string()),
            email: None,
            active: true,
            credential_hash: "$argon2id$...".to_string(),
            created_utc: Utc::now(),
        };
        let identity =
            Identity::from_record(record, BTreeSet::from([Capability::Forecasting]));

        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["capabilities"], serde_json::json!(["forecasting"]));
        assert!(json.get("credential_hash").is_none());
    }
}
