//! `PostgreSQL` directory of externally-owned relationship data.

use crate::storage_error;
use async_trait::async_trait;
use sqlx::PgPool;
use upkeep_core::directory::Directory;
use upkeep_core::types::{IssueId, UserId};
use upkeep_core::Result;

/// Read-only lookups against the `issues` and `provider_registrations`
/// tables, which belong to the surrounding property-management system.
#[derive(Clone)]
pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    /// Create a directory over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PostgresDirectory {
    async fn issue_owner(&self, issue_id: IssueId) -> Result<Option<UserId>> {
        let row: Option<(uuid::Uuid,)> =
            sqlx::query_as("SELECT owner_id FROM issues WHERE id = $1")
                .bind(*issue_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;
        Ok(row.map(|(owner,)| UserId::from_uuid(owner)))
    }

    async fn is_registered_provider(
        &self,
        owner_id: UserId,
        provider_id: UserId,
    ) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS (
                SELECT 1 FROM provider_registrations
                WHERE owner_id = $1 AND provider_id = $2
            )
            ",
        )
        .bind(*owner_id.as_uuid())
        .bind(*provider_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(exists)
    }

    async fn has_provider_registration(&self, user_id: UserId) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM provider_registrations WHERE provider_id = $1)",
        )
        .bind(*user_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(exists)
    }
}
