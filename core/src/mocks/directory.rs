//! In-memory directory of issues and provider registrations for testing.

use crate::directory::Directory;
use crate::error::Result;
use crate::types::{IssueId, UserId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    issues: HashMap<IssueId, UserId>,
    registrations: HashSet<(UserId, UserId)>,
}

/// In-memory stand-in for the external CRUD system's relationship data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issue owned by `owner_id`, returning its id.
    pub fn add_issue(&self, owner_id: UserId) -> IssueId {
        let issue_id = IssueId::new();
        self.locked().issues.insert(issue_id, owner_id);
        issue_id
    }

    /// Register `provider_id` as a provider for `owner_id`.
    pub fn register_provider(&self, owner_id: UserId, provider_id: UserId) {
        self.locked().registrations.insert((owner_id, provider_id));
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn issue_owner(&self, issue_id: IssueId) -> Result<Option<UserId>> {
        Ok(self.locked().issues.get(&issue_id).copied())
    }

    async fn is_registered_provider(
        &self,
        owner_id: UserId,
        provider_id: UserId,
    ) -> Result<bool> {
        Ok(self
            .locked()
            .registrations
            .contains(&(owner_id, provider_id)))
    }

    async fn has_provider_registration(&self, user_id: UserId) -> Result<bool> {
        Ok(self
            .locked()
            .registrations
            .iter()
            .any(|(_, provider)| *provider == user_id))
    }
}
