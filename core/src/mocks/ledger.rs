//! In-memory assignment ledger for testing.

use crate::error::Result;
use crate::ledger::{AssignOutcome, AssignmentLedger, ClearOutcome};
use crate::types::{IssueId, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, PoisonError};

/// In-memory assignment ledger.
///
/// `try_assign` performs its check-and-insert under one mutex, mirroring
/// the conditional-insert atomicity of the PostgreSQL implementation:
/// exactly one of any set of racing callers wins.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssignmentLedger {
    assignments: Arc<Mutex<HashMap<IssueId, UserId>>>,
}

impl InMemoryAssignmentLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, HashMap<IssueId, UserId>> {
        self.assignments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AssignmentLedger for InMemoryAssignmentLedger {
    async fn try_assign(&self, issue_id: IssueId, provider_id: UserId) -> Result<AssignOutcome> {
        match self.locked().entry(issue_id) {
            Entry::Occupied(_) => Ok(AssignOutcome::AlreadyAssigned),
            Entry::Vacant(slot) => {
                slot.insert(provider_id);
                Ok(AssignOutcome::Assigned)
            }
        }
    }

    async fn clear_assignment(
        &self,
        issue_id: IssueId,
        provider_id: UserId,
    ) -> Result<ClearOutcome> {
        match self.locked().entry(issue_id) {
            Entry::Occupied(slot) if *slot.get() == provider_id => {
                slot.remove();
                Ok(ClearOutcome::Cleared)
            }
            _ => Ok(ClearOutcome::NotAssigned),
        }
    }

    async fn assignment_for(&self, issue_id: IssueId) -> Result<Option<UserId>> {
        Ok(self.locked().get(&issue_id).copied())
    }

    async fn assigned_anywhere(&self, provider_id: UserId) -> Result<bool> {
        Ok(self.locked().values().any(|p| *p == provider_id))
    }
}
