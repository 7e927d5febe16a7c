//! PostgreSQL identity store.
//!
//! Uniqueness lives in the schema (primary keys on `users` and `user_permissions`), so a
//! write racing past the directory's pre-checks is still rejected here.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::models::{Capability, IdentityRecord};
use crate::services::store::{IdentityStore, StoreError};

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Duplicate(format!(
                    "Duplicate entry rejected by the store: {}",
                    db_err.message()
                ))
            }
            _ => StoreError::Backend(anyhow::anyhow!("Database error: {}", err)),
        }
    }
}

/// PostgreSQL-backed [`IdentityStore`].
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    /// Connect and apply pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("Migration failed: {}", e)))?;

        tracing::info!("Identity store connected and migrated");
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_identity(&self, user_id: &str) -> Result<Option<IdentityRecord>, StoreError> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            "SELECT user_id, full_name, email, active, pwd_hash, created_utc FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn capabilities_of(&self, user_id: &str) -> Result<BTreeSet<Capability>, StoreError> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT permission_id FROM user_permissions WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(ids
            .into_iter()
            .filter_map(|id| match id.parse::<Capability>() {
                Ok(capability) => Some(capability),
                Err(_) => {
                    tracing::warn!(user_id, permission_id = %id, "Ignoring unknown stored permission");
                    None
                }
            })
            .collect())
    }

    async fn insert_identity(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, full_name, email, active, pwd_hash, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.full_name)
        .bind(&record.email)
        .bind(record.active)
        .bind(&record.credential_hash)
        .bind(record.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_identity(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET full_name = $2, email = $3, active = $4, pwd_hash = $5
            WHERE user_id = $1
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.full_name)
        .bind(&record.email)
        .bind(record.active)
        .bind(&record.credential_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "User '{}' vanished before update",
                record.user_id
            )));
        }
        Ok(())
    }

    async fn delete_identity(&self, user_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn has_assignment(
        &self,
        user_id: &str,
        capability: Capability,
    ) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM user_permissions WHERE user_id = $1 AND permission_id = $2)",
        )
        .bind(user_id)
        .bind(capability.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_assignment(
        &self,
        user_id: &str,
        capability: Capability,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO user_permissions (user_id, permission_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(capability.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_assignment(
        &self,
        user_id: &str,
        capability: Capability,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1 AND permission_id = $2")
            .bind(user_id)
            .bind(capability.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| {
            tracing::error!("Identity store health check failed: {}", e);
            StoreError::from(e)
        })?;
        Ok(())
    }
}
