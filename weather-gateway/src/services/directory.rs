//! Referential integrity for identities and capability assignments.
//!
//! Precondition checks run in a fixed order and the first failure wins; nothing is
//! written until all of them pass. Whether the caller may manage users at all is decided
//! by the gateway before these methods are reached.

use chrono::Utc;
use std::sync::Arc;

use crate::models::{IdentityRecord, IdentityRequest, OperationResult, PermissionCatalog};
use crate::services::store::{IdentityStore, StoreError};
use crate::services::ServiceError;
use crate::utils::{CredentialHasher, Password};

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn IdentityStore>,
    hasher: Arc<dyn CredentialHasher>,
    catalog: Arc<PermissionCatalog>,
}

impl UserDirectory {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        hasher: Arc<dyn CredentialHasher>,
        catalog: Arc<PermissionCatalog>,
    ) -> Self {
        Self {
            store,
            hasher,
            catalog,
        }
    }

    pub async fn add_identity(
        &self,
        candidate: IdentityRequest,
    ) -> Result<OperationResult, ServiceError> {
        if self.store.identity_exists(&candidate.user_id).await? {
            return Err(ServiceError::Conflict("USER_ID already exists".to_string()));
        }

        let record = self.to_record(candidate)?;
        let outcome = self.store.insert_identity(&record).await;

        settle(outcome, format!("User '{}' added", record.user_id))
    }

    pub async fn edit_identity(
        &self,
        candidate: IdentityRequest,
    ) -> Result<OperationResult, ServiceError> {
        self.guard_administrator(&candidate.user_id, "This user can't be updated")?;

        if !self.store.identity_exists(&candidate.user_id).await? {
            return Err(ServiceError::NotFound(format!(
                "User '{}' doesn't exist",
                candidate.user_id
            )));
        }

        let record = self.to_record(candidate)?;
        let outcome = self.store.update_identity(&record).await;

        settle(outcome, format!("User '{}' updated", record.user_id))
    }

    pub async fn delete_identity(&self, user_id: &str) -> Result<OperationResult, ServiceError> {
        self.guard_administrator(user_id, "This user can't be deleted")?;

        if !self.store.identity_exists(user_id).await? {
            return Err(ServiceError::NotFound("User doesn't exist".to_string()));
        }

        let outcome = self.store.delete_identity(user_id).await;

        settle(outcome, format!("User '{}' deleted", user_id))
    }

    pub async fn add_assignment(
        &self,
        user_id: &str,
        capability_id: &str,
    ) -> Result<OperationResult, ServiceError> {
        self.guard_administrator(user_id, "This user can't be updated")?;

        if !self.store.identity_exists(user_id).await? {
            return Err(ServiceError::NotFound(format!(
                "User '{}' doesn't exist",
                user_id
            )));
        }

        let capability = self.catalog.lookup(capability_id).ok_or_else(|| {
            ServiceError::NotFound(format!("Permission '{}' doesn't exist", capability_id))
        })?;

        if self.store.has_assignment(user_id, capability).await? {
            return Err(ServiceError::Conflict(format!(
                "Permission '{}' already given to user '{}'",
                capability, user_id
            )));
        }

        let outcome = self.store.insert_assignment(user_id, capability).await;

        settle(
            outcome,
            format!("Permission '{}' given to user '{}'", capability, user_id),
        )
    }

    pub async fn remove_assignment(
        &self,
        user_id: &str,
        capability_id: &str,
    ) -> Result<OperationResult, ServiceError> {
        self.guard_administrator(user_id, "This user_permission can't be deleted")?;

        let missing = || {
            ServiceError::NotFound(format!(
                "User '{}' has no permission '{}'",
                user_id, capability_id
            ))
        };

        let capability = self.catalog.lookup(capability_id).ok_or_else(missing)?;
        if !self.store.has_assignment(user_id, capability).await? {
            return Err(missing());
        }

        let outcome = self.store.delete_assignment(user_id, capability).await;

        settle(
            outcome,
            format!("Permission '{}' removed from user '{}'", capability, user_id),
        )
    }

    /// Create the reserved administrator with every catalog capability if it is missing.
    /// An existing administrator is left as it is.
    pub async fn ensure_administrator(&self, password: &Password) -> Result<(), ServiceError> {
        let admin_id = self.catalog.administrator_id();

        if self.store.identity_exists(admin_id).await? {
            tracing::info!(user_id = %admin_id, "Administrator already provisioned");
            return Ok(());
        }

        let record = IdentityRecord {
            user_id: admin_id.to_string(),
            full_name: Some("Administrator".to_string()),
            email: None,
            active: true,
            credential_hash: self.hasher.hash(password)?,
            created_utc: Utc::now(),
        };

        match self.store.insert_identity(&record).await {
            Ok(()) => {}
            // Another instance won the race; its administrator is as good as ours.
            Err(StoreError::Duplicate(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        for capability in self.catalog.capabilities() {
            match self.store.insert_assignment(admin_id, capability).await {
                Ok(()) | Err(StoreError::Duplicate(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(user_id = %admin_id, "Administrator provisioned");
        Ok(())
    }

    fn guard_administrator(&self, user_id: &str, message: &str) -> Result<(), ServiceError> {
        if self.catalog.is_administrator(user_id) {
            tracing::warn!(user_id = %user_id, "Refused change to reserved administrator");
            return Err(ServiceError::Authorization(message.to_string()));
        }
        Ok(())
    }

    fn to_record(&self, candidate: IdentityRequest) -> Result<IdentityRecord, ServiceError> {
        let credential_hash = self.hasher.hash(&candidate.password)?;
        Ok(IdentityRecord {
            user_id: candidate.user_id,
            full_name: candidate.full_name,
            email: candidate.email,
            active: candidate.active,
            credential_hash,
            created_utc: Utc::now(),
        })
    }
}

/// Turn a store write into the operation envelope. A uniqueness violation detected by
/// the store is a conflict, not a backend failure.
fn settle(
    outcome: Result<(), StoreError>,
    confirmation: String,
) -> Result<OperationResult, ServiceError> {
    match outcome {
        Ok(()) => {
            tracing::info!(%confirmation, "Directory updated");
            Ok(OperationResult::confirmation(confirmation))
        }
        Err(StoreError::Duplicate(what)) => Err(ServiceError::Conflict(what)),
        Err(StoreError::Backend(e)) => {
            tracing::error!(error = %e, "Identity store rejected write");
            Ok(OperationResult::failure(e.to_string()))
        }
    }
}
