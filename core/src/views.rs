//! Read-only projections consumed by the client.
//!
//! Nothing in here mutates state or enforces invariants beyond the
//! owner-only scoping of [`QueryViews::for_issue`].

use crate::directory::Directory;
use crate::error::{CoordinatorError, Result};
use crate::ledger::AssignmentLedger;
use crate::store::{RequestStore, StatusFilter};
use crate::types::{IssueId, ServiceRequest, UserId};
use std::sync::Arc;

/// Default number of history entries returned when the caller gives no
/// limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Upper bound on history entries per call.
pub const MAX_HISTORY_LIMIT: usize = 200;

/// Read-side queries over the request store and the ledger.
#[derive(Clone)]
pub struct QueryViews {
    store: Arc<dyn RequestStore>,
    ledger: Arc<dyn AssignmentLedger>,
    directory: Arc<dyn Directory>,
}

impl QueryViews {
    /// Create the read side over the given seams.
    #[must_use]
    pub fn new(
        store: Arc<dyn RequestStore>,
        ledger: Arc<dyn AssignmentLedger>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            store,
            ledger,
            directory,
        }
    }

    /// Open invitations addressed to the provider.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying query fails.
    pub async fn pending_for_provider(&self, provider_id: UserId) -> Result<Vec<ServiceRequest>> {
        self.store
            .list_for_provider(provider_id, StatusFilter::Pending, usize::MAX)
            .await
    }

    /// The provider's response history, most recent first.
    ///
    /// `limit` defaults to [`DEFAULT_HISTORY_LIMIT`] and is capped at
    /// [`MAX_HISTORY_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying query fails.
    pub async fn history_for_provider(
        &self,
        provider_id: UserId,
        limit: Option<usize>,
    ) -> Result<Vec<ServiceRequest>> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .min(MAX_HISTORY_LIMIT);
        self.store
            .list_for_provider(provider_id, StatusFilter::Responded, limit)
            .await
    }

    /// Every request ever sent for the issue, owner-only.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::NotFound`] for an unknown issue,
    /// [`CoordinatorError::Forbidden`] when the caller does not own it,
    /// plus storage failures.
    pub async fn for_issue(&self, caller: UserId, issue_id: IssueId) -> Result<Vec<ServiceRequest>> {
        let owner = self
            .directory
            .issue_owner(issue_id)
            .await?
            .ok_or(CoordinatorError::NotFound)?;
        if owner != caller {
            return Err(CoordinatorError::Forbidden);
        }
        self.store.list_for_issue(issue_id).await
    }

    /// Number of open invitations addressed to the provider.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying query fails.
    pub async fn pending_count(&self, provider_id: UserId) -> Result<u64> {
        self.store.pending_count(provider_id).await
    }

    /// Whether the user acts as a provider anywhere: a registration with
    /// some owner, a non-terminal request addressed to them, or a current
    /// ledger assignment.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any underlying query fails.
    pub async fn is_provider(&self, user_id: UserId) -> Result<bool> {
        if self.directory.has_provider_registration(user_id).await? {
            return Ok(true);
        }
        if self.store.has_active_request(user_id).await? {
            return Ok(true);
        }
        self.ledger.assigned_anywhere(user_id).await
    }
}
