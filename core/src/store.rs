//! Durable storage of service-request records.
//!
//! [`RequestStore`] is the single source of truth for request status. The
//! one mutating primitive besides `create` is [`RequestStore::transition`],
//! a compare-and-transition: the status is updated only if the row still
//! carries the expected status at the moment of the write. A failed
//! comparison is reported as [`TransitionOutcome::Conflict`], a value rather
//! than an error, because it is the building block the coordinator uses to
//! resolve races. No other component may write `status`.

use crate::error::Result;
use crate::types::{IssueId, NewServiceRequest, RequestId, RequestStatus, ServiceRequest, UserId};
use async_trait::async_trait;

/// Outcome of [`RequestStore::create`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The `Pending` request was created.
    Created(ServiceRequest),
    /// A `Pending` request for the same (issue, provider) already exists;
    /// no row was created.
    DuplicatePending,
}

/// Outcome of [`RequestStore::transition`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The row carried the expected status and was updated.
    Applied(ServiceRequest),
    /// The row's status was not the expected one; nothing was written.
    Conflict,
}

/// Which statuses a provider-scoped listing should include.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusFilter {
    /// All requests regardless of status.
    Any,
    /// Only `Pending` requests.
    Pending,
    /// Everything except `Pending` (the response history).
    Responded,
}

/// Durable store of [`ServiceRequest`] rows.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Create a new `Pending` request.
    ///
    /// The store itself enforces the at-most-one-pending-per
    /// (issue, provider) invariant; a duplicate is reported as
    /// [`CreateOutcome::DuplicatePending`] and creates no row.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Storage`](crate::CoordinatorError::Storage)
    /// if the underlying write fails.
    async fn create(&self, new: NewServiceRequest) -> Result<CreateOutcome>;

    /// Fetch a request by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying query fails.
    async fn get(&self, id: RequestId) -> Result<Option<ServiceRequest>>;

    /// All requests for one issue, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying query fails.
    async fn list_for_issue(&self, issue_id: IssueId) -> Result<Vec<ServiceRequest>>;

    /// Requests where the given user is the provider, filtered by status,
    /// most recently acted on first, bounded by `limit`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying query fails.
    async fn list_for_provider(
        &self,
        provider_id: UserId,
        filter: StatusFilter,
        limit: usize,
    ) -> Result<Vec<ServiceRequest>>;

    /// The request for (issue, provider) currently in `status`, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying query fails.
    async fn find_for_issue_and_provider(
        &self,
        issue_id: IssueId,
        provider_id: UserId,
        status: RequestStatus,
    ) -> Result<Option<ServiceRequest>>;

    /// Number of `Pending` requests addressed to the provider.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying query fails.
    async fn pending_count(&self, provider_id: UserId) -> Result<u64>;

    /// Whether the user appears as the provider on any non-terminal request.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying query fails.
    async fn has_active_request(&self, provider_id: UserId) -> Result<bool>;

    /// Compare-and-transition: move the row from `expected` to `next`,
    /// recording `response_message` and stamping `responded_at` on the
    /// first transition out of `Pending` or `Accepted`.
    ///
    /// The comparison and the write are a single atomic step with respect
    /// to concurrent callers; when the row no longer carries `expected`
    /// the outcome is [`TransitionOutcome::Conflict`] and nothing changes.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying write fails. A lost
    /// comparison is not an error.
    async fn transition(
        &self,
        id: RequestId,
        expected: RequestStatus,
        next: RequestStatus,
        response_message: Option<String>,
    ) -> Result<TransitionOutcome>;
}
