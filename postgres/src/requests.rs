//! `PostgreSQL` request store.

use crate::storage_error;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use upkeep_core::store::{CreateOutcome, RequestStore, StatusFilter, TransitionOutcome};
use upkeep_core::types::{
    IssueId, NewServiceRequest, RequestId, RequestStatus, ServiceRequest, UserId,
};
use upkeep_core::{CoordinatorError, Result};

const REQUEST_COLUMNS: &str = "id, issue_id, provider_id, owner_id, status, \
     offer_message, response_message, created_at, responded_at";

/// `PostgreSQL`-backed [`RequestStore`].
///
/// The status column is written exclusively through
/// [`RequestStore::transition`], a single conditional `UPDATE` whose
/// `WHERE status = expected` clause is evaluated by the database, never by
/// a prior read.
#[derive(Clone)]
pub struct PostgresRequestStore {
    pool: PgPool,
}

impl PostgresRequestStore {
    /// Create a request store over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_request(row: &sqlx::postgres::PgRow) -> Result<ServiceRequest> {
        let status_str: String = row.get("status");
        let status = RequestStatus::parse(&status_str).ok_or_else(|| {
            CoordinatorError::Storage(format!("invalid request status: {status_str}"))
        })?;
        Ok(ServiceRequest {
            id: RequestId::from_uuid(row.get("id")),
            issue_id: IssueId::from_uuid(row.get("issue_id")),
            provider_id: UserId::from_uuid(row.get("provider_id")),
            owner_id: UserId::from_uuid(row.get("owner_id")),
            status,
            offer_message: row.get("offer_message"),
            response_message: row.get("response_message"),
            created_at: row.get("created_at"),
            responded_at: row.get("responded_at"),
        })
    }
}

#[async_trait]
impl RequestStore for PostgresRequestStore {
    async fn create(&self, new: NewServiceRequest) -> Result<CreateOutcome> {
        // The partial unique index on pending (issue, provider) pairs turns
        // a duplicate into a no-op insert rather than an error, keeping the
        // check-and-create atomic.
        let row = sqlx::query(&format!(
            r"
            INSERT INTO service_requests
                (id, issue_id, provider_id, owner_id, status, offer_message)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (issue_id, provider_id) WHERE status = 'pending'
                DO NOTHING
            RETURNING {REQUEST_COLUMNS}
            "
        ))
        .bind(*RequestId::new().as_uuid())
        .bind(*new.issue_id.as_uuid())
        .bind(*new.provider_id.as_uuid())
        .bind(*new.owner_id.as_uuid())
        .bind(RequestStatus::Pending.as_str())
        .bind(new.offer_message)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match row {
            Some(row) => Ok(CreateOutcome::Created(Self::row_to_request(&row)?)),
            None => Ok(CreateOutcome::DuplicatePending),
        }
    }

    async fn get(&self, id: RequestId) -> Result<Option<ServiceRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM service_requests WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        row.as_ref().map(Self::row_to_request).transpose()
    }

    async fn list_for_issue(&self, issue_id: IssueId) -> Result<Vec<ServiceRequest>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {REQUEST_COLUMNS} FROM service_requests
            WHERE issue_id = $1
            ORDER BY created_at DESC
            "
        ))
        .bind(*issue_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        rows.iter().map(Self::row_to_request).collect()
    }

    async fn list_for_provider(
        &self,
        provider_id: UserId,
        filter: StatusFilter,
        limit: usize,
    ) -> Result<Vec<ServiceRequest>> {
        let status_clause = match filter {
            StatusFilter::Any => "",
            StatusFilter::Pending => "AND status = 'pending'",
            StatusFilter::Responded => "AND status <> 'pending'",
        };
        let rows = sqlx::query(&format!(
            r"
            SELECT {REQUEST_COLUMNS} FROM service_requests
            WHERE provider_id = $1 {status_clause}
            ORDER BY COALESCE(responded_at, created_at) DESC
            LIMIT $2
            "
        ))
        .bind(*provider_id.as_uuid())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        rows.iter().map(Self::row_to_request).collect()
    }

    async fn find_for_issue_and_provider(
        &self,
        issue_id: IssueId,
        provider_id: UserId,
        status: RequestStatus,
    ) -> Result<Option<ServiceRequest>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {REQUEST_COLUMNS} FROM service_requests
            WHERE issue_id = $1 AND provider_id = $2 AND status = $3
            ORDER BY created_at DESC
            LIMIT 1
            "
        ))
        .bind(*issue_id.as_uuid())
        .bind(*provider_id.as_uuid())
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        row.as_ref().map(Self::row_to_request).transpose()
    }

    async fn pending_count(&self, provider_id: UserId) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM service_requests WHERE provider_id = $1 AND status = 'pending'",
        )
        .bind(*provider_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(count.unsigned_abs())
    }

    async fn has_active_request(&self, provider_id: UserId) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS (
                SELECT 1 FROM service_requests
                WHERE provider_id = $1 AND status IN ('pending', 'accepted')
            )
            ",
        )
        .bind(*provider_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(exists)
    }

    async fn transition(
        &self,
        id: RequestId,
        expected: RequestStatus,
        next: RequestStatus,
        response_message: Option<String>,
    ) -> Result<TransitionOutcome> {
        // Compare-and-transition in one statement: the database checks the
        // expected status at the moment of the write. `responded_at` is set
        // once and never overwritten.
        let row = sqlx::query(&format!(
            r"
            UPDATE service_requests
            SET status = $3,
                response_message = COALESCE($4, response_message),
                responded_at = COALESCE(responded_at, now())
            WHERE id = $1 AND status = $2
            RETURNING {REQUEST_COLUMNS}
            "
        ))
        .bind(*id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(response_message)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match row {
            Some(row) => Ok(TransitionOutcome::Applied(Self::row_to_request(&row)?)),
            None => {
                tracing::debug!(
                    request_id = %id,
                    expected = expected.as_str(),
                    next = next.as_str(),
                    "compare-and-transition conflict"
                );
                Ok(TransitionOutcome::Conflict)
            }
        }
    }
}
