//! Identity store collaborator: the persistence seam of the user directory.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{Capability, IdentityRecord};

#[derive(Error, Debug)]
pub enum StoreError {
    /// The store's own uniqueness constraint rejected a write.
    #[error("{0}")]
    Duplicate(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Storage for identities and their capability assignments.
///
/// Implementations must enforce uniqueness of identity ids and of (identity, capability)
/// pairs themselves and report violations as [`StoreError::Duplicate`]. Deleting an
/// identity removes its assignments.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_identity(&self, user_id: &str) -> Result<Option<IdentityRecord>, StoreError>;

    async fn capabilities_of(&self, user_id: &str) -> Result<BTreeSet<Capability>, StoreError>;

    async fn insert_identity(&self, record: &IdentityRecord) -> Result<(), StoreError>;

    async fn update_identity(&self, record: &IdentityRecord) -> Result<(), StoreError>;

    async fn delete_identity(&self, user_id: &str) -> Result<(), StoreError>;

    async fn has_assignment(
        &self,
        user_id: &str,
        capability: Capability,
    ) -> Result<bool, StoreError>;

    async fn insert_assignment(
        &self,
        user_id: &str,
        capability: Capability,
    ) -> Result<(), StoreError>;

    async fn delete_assignment(
        &self,
        user_id: &str,
        capability: Capability,
    ) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    async fn identity_exists(&self, user_id: &str) -> Result<bool, StoreError> {
        Ok(self.find_identity(user_id).await?.is_some())
    }
}

#[derive(Default)]
struct Tables {
    identities: HashMap<String, IdentityRecord>,
    assignments: HashSet<(String, Capability)>,
}

/// Process-local store used in development and tests.
#[derive(Default)]
pub struct InMemoryIdentityStore {
    tables: RwLock<Tables>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_identity(&self, user_id: &str) -> Result<Option<IdentityRecord>, StoreError> {
        Ok(self.tables.read().await.identities.get(user_id).cloned())
    }

    async fn capabilities_of(&self, user_id: &str) -> Result<BTreeSet<Capability>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .assignments
            .iter()
            .filter(|(owner, _)| owner == user_id)
            .map(|(_, capability)| *capability)
            .collect())
    }

    async fn insert_identity(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.identities.contains_key(&record.user_id) {
            return Err(StoreError::Duplicate(format!(
                "User '{}' already exists",
                record.user_id
            )));
        }
        tables
            .identities
            .insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    async fn update_identity(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.identities.get_mut(&record.user_id) {
            Some(existing) => {
                // Creation time belongs to the original row.
                let created_utc = existing.created_utc;
                *existing = record.clone();
                existing.created_utc = created_utc;
                Ok(())
            }
            None => Err(StoreError::Backend(anyhow::anyhow!(
                "User '{}' vanished before update",
                record.user_id
            ))),
        }
    }

    async fn delete_identity(&self, user_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.identities.remove(user_id);
        tables.assignments.retain(|(owner, _)| owner != user_id);
        Ok(())
    }

    async fn has_assignment(
        &self,
        user_id: &str,
        capability: Capability,
    ) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .assignments
            .contains(&(user_id.to_string(), capability)))
    }

    async fn insert_assignment(
        &self,
        user_id: &str,
        capability: Capability,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.identities.contains_key(user_id) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "User '{}' vanished before assignment",
                user_id
            )));
        }
        if !tables.assignments.insert((user_id.to_string(), capability)) {
            return Err(StoreError::Duplicate(format!(
                "Permission '{}' already given to user '{}'",
                capability, user_id
            )));
        }
        Ok(())
    }

    async fn delete_assignment(
        &self,
        user_id: &str,
        capability: Capability,
    ) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .assignments
            .remove(&(user_id.to_string(), capability));
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(user_id: &str) -> IdentityRecord {
        IdentityRecord {
            user_id: user_id.to_string(),
            full_name: None,
            email: None,
            active: true,
            credential_hash: "hash".to_string(),
            created_utc: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_identity_is_reported_by_the_store() {
        let store = InMemoryIdentityStore::new();
        store.insert_identity(&record("alice")).await.unwrap();

        let err = store.insert_identity(&record("alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn duplicate_assignment_is_reported_by_the_store() {
        let store = InMemoryIdentityStore::new();
        store.insert_identity(&record("alice")).await.unwrap();
        store
            .insert_assignment("alice", Capability::Training)
            .await
            .unwrap();

        let err = store
            .insert_assignment("alice", Capability::Training)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn delete_cascades_to_assignments() {
        let store = InMemoryIdentityStore::new();
        store.insert_identity(&record("alice")).await.unwrap();
        store
            .insert_assignment("alice", Capability::Forecasting)
            .await
            .unwrap();

        store.delete_identity("alice").await.unwrap();
        store.insert_identity(&record("alice")).await.unwrap();

        assert!(store.capabilities_of("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_keeps_creation_time() {
        let store = InMemoryIdentityStore::new();
        let original = record("alice");
        store.insert_identity(&original).await.unwrap();

        let mut changed = record("alice");
        changed.full_name = Some("Alice Lemery".to_string());
        store.update_identity(&changed).await.unwrap();

        let stored = store.find_identity("alice").await.unwrap().unwrap();
        assert_eq!(stored.full_name.as_deref(), Some("Alice Lemery"));
        assert_eq!(stored.created_utc, original.created_utc);
    }
}
