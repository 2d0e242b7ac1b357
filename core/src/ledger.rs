//! Per-issue assignment ledger.
//!
//! The ledger records the single derived fact "which provider, if any, is
//! currently attached to this issue". [`AssignmentLedger::try_assign`] must
//! be atomic with respect to concurrent callers for the same issue: when
//! two accepts race, exactly one observes [`AssignOutcome::Assigned`] and
//! the other [`AssignOutcome::AlreadyAssigned`]. Implementations evaluate
//! the condition inside the storage layer itself (a conditional insert
//! against an issue-keyed uniqueness constraint), never as a read followed
//! by a write.

use crate::error::Result;
use crate::types::{IssueId, UserId};
use async_trait::async_trait;

/// Outcome of [`AssignmentLedger::try_assign`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOutcome {
    /// The caller now holds the assignment.
    Assigned,
    /// Another provider already holds it; nothing was written.
    AlreadyAssigned,
}

/// Outcome of [`AssignmentLedger::clear_assignment`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearOutcome {
    /// The assignment was removed and the issue reopened.
    Cleared,
    /// The given provider did not hold the assignment; nothing changed.
    NotAssigned,
}

/// Atomic per-issue assignment facts.
///
/// Assigning also marks the issue "provider attached"; clearing marks it
/// "provider removed". Both label writes happen in the same storage
/// transaction as the ledger write, so the label can never disagree with
/// the ledger.
#[async_trait]
pub trait AssignmentLedger: Send + Sync {
    /// Attach `provider_id` to `issue_id` if, and only if, no provider is
    /// currently attached. Exactly one of any set of racing callers wins.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying write fails. Losing the
    /// race is the [`AssignOutcome::AlreadyAssigned`] value, not an error.
    async fn try_assign(&self, issue_id: IssueId, provider_id: UserId) -> Result<AssignOutcome>;

    /// Detach `provider_id` from `issue_id` if they currently hold the
    /// assignment.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying write fails.
    async fn clear_assignment(
        &self,
        issue_id: IssueId,
        provider_id: UserId,
    ) -> Result<ClearOutcome>;

    /// The provider currently attached to the issue, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying query fails.
    async fn assignment_for(&self, issue_id: IssueId) -> Result<Option<UserId>>;

    /// Whether the provider currently holds the assignment on any issue.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying query fails.
    async fn assigned_anywhere(&self, provider_id: UserId) -> Result<bool>;
}
