//! In-memory request store for testing.

use crate::error::Result;
use crate::store::{CreateOutcome, RequestStore, StatusFilter, TransitionOutcome};
use crate::types::{IssueId, NewServiceRequest, RequestId, RequestStatus, ServiceRequest, UserId};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// In-memory request store.
///
/// All mutations run under one mutex, which serializes the
/// compare-and-transition exactly like the conditional update in the
/// PostgreSQL implementation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRequestStore {
    requests: Arc<Mutex<HashMap<RequestId, ServiceRequest>>>,
}

impl InMemoryRequestStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every row (for assertions).
    #[must_use]
    pub fn all(&self) -> Vec<ServiceRequest> {
        self.locked().values().cloned().collect()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, ServiceRequest>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn create(&self, new: NewServiceRequest) -> Result<CreateOutcome> {
        let mut requests = self.locked();
        let duplicate = requests.values().any(|r| {
            r.issue_id == new.issue_id
                && r.provider_id == new.provider_id
                && r.status == RequestStatus::Pending
        });
        if duplicate {
            return Ok(CreateOutcome::DuplicatePending);
        }
        let request = ServiceRequest {
            id: RequestId::new(),
            issue_id: new.issue_id,
            provider_id: new.provider_id,
            owner_id: new.owner_id,
            status: RequestStatus::Pending,
            offer_message: new.offer_message,
            response_message: None,
            created_at: Utc::now(),
            responded_at: None,
        };
        requests.insert(request.id, request.clone());
        Ok(CreateOutcome::Created(request))
    }

    async fn get(&self, id: RequestId) -> Result<Option<ServiceRequest>> {
        Ok(self.locked().get(&id).cloned())
    }

    async fn list_for_issue(&self, issue_id: IssueId) -> Result<Vec<ServiceRequest>> {
        let mut rows: Vec<ServiceRequest> = self
            .locked()
            .values()
            .filter(|r| r.issue_id == issue_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_for_provider(
        &self,
        provider_id: UserId,
        filter: StatusFilter,
        limit: usize,
    ) -> Result<Vec<ServiceRequest>> {
        let mut rows: Vec<ServiceRequest> = self
            .locked()
            .values()
            .filter(|r| r.provider_id == provider_id)
            .filter(|r| match filter {
                StatusFilter::Any => true,
                StatusFilter::Pending => r.status == RequestStatus::Pending,
                StatusFilter::Responded => r.status != RequestStatus::Pending,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let a_key = a.responded_at.unwrap_or(a.created_at);
            let b_key = b.responded_at.unwrap_or(b.created_at);
            b_key.cmp(&a_key)
        });
        rows.truncate(limit);
        Ok(rows)
    }

    async fn find_for_issue_and_provider(
        &self,
        issue_id: IssueId,
        provider_id: UserId,
        status: RequestStatus,
    ) -> Result<Option<ServiceRequest>> {
        Ok(self
            .locked()
            .values()
            .find(|r| {
                r.issue_id == issue_id && r.provider_id == provider_id && r.status == status
            })
            .cloned())
    }

    async fn pending_count(&self, provider_id: UserId) -> Result<u64> {
        Ok(self
            .locked()
            .values()
            .filter(|r| r.provider_id == provider_id && r.status == RequestStatus::Pending)
            .count() as u64)
    }

    async fn has_active_request(&self, provider_id: UserId) -> Result<bool> {
        Ok(self
            .locked()
            .values()
            .any(|r| r.provider_id == provider_id && !r.status.is_terminal()))
    }

    async fn transition(
        &self,
        id: RequestId,
        expected: RequestStatus,
        next: RequestStatus,
        response_message: Option<String>,
    ) -> Result<TransitionOutcome> {
        let mut requests = self.locked();
        let Some(request) = requests.get_mut(&id) else {
            return Ok(TransitionOutcome::Conflict);
        };
        if request.status != expected {
            return Ok(TransitionOutcome::Conflict);
        }
        request.status = next;
        if response_message.is_some() {
            request.response_message = response_message;
        }
        if request.responded_at.is_none() {
            request.responded_at = Some(Utc::now());
        }
        Ok(TransitionOutcome::Applied(request.clone()))
    }
}
