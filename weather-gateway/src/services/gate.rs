use crate::models::{Capability, Identity, PermissionCatalog};
use crate::services::ServiceError;

/// Capability checks against a freshly resolved caller.
pub struct PermissionGate;

impl PermissionGate {
    pub fn require(identity: &Identity, capability: Capability) -> Result<(), ServiceError> {
        if identity.has_capability(capability) {
            return Ok(());
        }

        tracing::warn!(
            user_id = %identity.user_id,
            required_capability = %capability,
            granted = ?identity.capabilities,
            "Insufficient capabilities"
        );
        Err(ServiceError::Authorization(
            "You don't have the permission".to_string(),
        ))
    }

    pub fn require_active(identity: &Identity) -> Result<(), ServiceError> {
        if identity.active {
            return Ok(());
        }

        tracing::warn!(user_id = %identity.user_id, "Inactive identity attempted a gated operation");
        Err(ServiceError::Authorization("Inactive user".to_string()))
    }

    /// Active identity holding `capability`. Used before every gated business operation.
    pub fn authorize(identity: &Identity, capability: Capability) -> Result<(), ServiceError> {
        Self::require_active(identity)?;
        Self::require(identity, capability)
    }

    pub fn require_administrator(
        identity: &Identity,
        catalog: &PermissionCatalog,
    ) -> Result<(), ServiceError> {
        Self::require_active(identity)?;
        if catalog.is_administrator(&identity.user_id) {
            return Ok(());
        }

        tracing::warn!(user_id = %identity.user_id, "Administrator-only operation refused");
        Err(ServiceError::Authorization(
            "You don't have the permission".to_string(),
        ))
    }
}
