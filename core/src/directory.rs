//! Read-only view of the surrounding CRUD system's relationship data.
//!
//! Issue ownership and owner-to-provider registrations are owned by the
//! external property-management system. The coordinator only ever reads
//! them, through this seam, to validate who may invite whom.

use crate::error::Result;
use crate::types::{IssueId, UserId};
use async_trait::async_trait;

/// Relationship lookups against externally-owned records.
#[async_trait]
pub trait Directory: Send + Sync {
    /// The owner of the issue, or `None` if the issue does not exist.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying query fails.
    async fn issue_owner(&self, issue_id: IssueId) -> Result<Option<UserId>>;

    /// Whether `provider_id` is registered as a provider for `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying query fails.
    async fn is_registered_provider(&self, owner_id: UserId, provider_id: UserId)
    -> Result<bool>;

    /// Whether the user appears in any owner's provider registrations.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the underlying query fails.
    async fn has_provider_registration(&self, user_id: UserId) -> Result<bool>;
}
