//! `PostgreSQL` assignment ledger.

use crate::storage_error;
use async_trait::async_trait;
use sqlx::PgPool;
use upkeep_core::ledger::{AssignOutcome, AssignmentLedger, ClearOutcome};
use upkeep_core::types::{IssueId, UserId};
use upkeep_core::Result;

/// Issue status label written when a provider is attached.
const ISSUE_ASSIGNED: &str = "Assigned";

/// Issue status label written when the provider is removed.
const ISSUE_UNASSIGNED: &str = "Unassigned";

/// `PostgreSQL`-backed [`AssignmentLedger`].
///
/// The `issue_assignments` primary key on `issue_id` is the uniqueness
/// constraint the single-assignment invariant rests on: `try_assign` is
/// one `INSERT .. ON CONFLICT DO NOTHING`, so of any set of racing
/// accepts the database commits exactly one. The issue status label is
/// flipped inside the same transaction and can never disagree with the
/// ledger.
#[derive(Clone)]
pub struct PostgresAssignmentLedger {
    pool: PgPool,
}

impl PostgresAssignmentLedger {
    /// Create a ledger over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssignmentLedger for PostgresAssignmentLedger {
    async fn try_assign(&self, issue_id: IssueId, provider_id: UserId) -> Result<AssignOutcome> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let inserted = sqlx::query(
            r"
            INSERT INTO issue_assignments (issue_id, provider_id)
            VALUES ($1, $2)
            ON CONFLICT (issue_id) DO NOTHING
            ",
        )
        .bind(*issue_id.as_uuid())
        .bind(*provider_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await.map_err(storage_error)?;
            return Ok(AssignOutcome::AlreadyAssigned);
        }

        sqlx::query("UPDATE issues SET status = $2 WHERE id = $1")
            .bind(*issue_id.as_uuid())
            .bind(ISSUE_ASSIGNED)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        Ok(AssignOutcome::Assigned)
    }

    async fn clear_assignment(
        &self,
        issue_id: IssueId,
        provider_id: UserId,
    ) -> Result<ClearOutcome> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let deleted = sqlx::query(
            "DELETE FROM issue_assignments WHERE issue_id = $1 AND provider_id = $2",
        )
        .bind(*issue_id.as_uuid())
        .bind(*provider_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await.map_err(storage_error)?;
            return Ok(ClearOutcome::NotAssigned);
        }

        sqlx::query("UPDATE issues SET status = $2 WHERE id = $1")
            .bind(*issue_id.as_uuid())
            .bind(ISSUE_UNASSIGNED)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        Ok(ClearOutcome::Cleared)
    }

    async fn assignment_for(&self, issue_id: IssueId) -> Result<Option<UserId>> {
        let row: Option<(uuid::Uuid,)> =
            sqlx::query_as("SELECT provider_id FROM issue_assignments WHERE issue_id = $1")
                .bind(*issue_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;
        Ok(row.map(|(provider,)| UserId::from_uuid(provider)))
    }

    async fn assigned_anywhere(&self, provider_id: UserId) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM issue_assignments WHERE provider_id = $1)",
        )
        .bind(*provider_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(exists)
    }
}
