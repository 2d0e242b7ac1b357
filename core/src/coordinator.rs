//! The service-request assignment coordinator.
//!
//! Enforces the request state machine and the "at most one active
//! assignment per issue" invariant across concurrent callers. The
//! coordinator never resolves a race itself: it leans on the two storage
//! primitives that are atomic by contract, [`AssignmentLedger::try_assign`]
//! and [`RequestStore::transition`], and only sequences them.
//!
//! The ordering inside [`Coordinator::accept`] is load-bearing: the ledger
//! write commits first, then the winning row's transition, then sibling
//! expiry. A racing accept on a sibling therefore always observes the issue
//! as already assigned, no matter how the calls interleave.

use crate::directory::Directory;
use crate::error::{CoordinatorError, Result};
use crate::ledger::{AssignOutcome, AssignmentLedger, ClearOutcome};
use crate::notify::{EventKind, NotificationDispatcher, NotificationEvent};
use crate::store::{CreateOutcome, RequestStore, TransitionOutcome};
use crate::types::{IssueId, NewServiceRequest, RequestId, RequestStatus, ServiceRequest, UserId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Response message recorded on requests invalidated by a sibling's
/// acceptance.
pub const ASSIGNMENT_TAKEN_MESSAGE: &str = "assignment already taken";

/// Per-provider outcome of [`Coordinator::send_multiple`].
#[derive(Clone, Debug)]
pub struct SendOutcome {
    /// The provider this outcome is for.
    pub provider_id: UserId,
    /// The created request, or why this provider's invitation failed.
    pub result: Result<ServiceRequest>,
}

/// Enforces the state machine over the storage seams.
///
/// Cloning is cheap; all fields are shared handles.
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn RequestStore>,
    ledger: Arc<dyn AssignmentLedger>,
    directory: Arc<dyn Directory>,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl Coordinator {
    /// Create a coordinator over the given storage and notification seams.
    #[must_use]
    pub fn new(
        store: Arc<dyn RequestStore>,
        ledger: Arc<dyn AssignmentLedger>,
        directory: Arc<dyn Directory>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            store,
            ledger,
            directory,
            dispatcher,
        }
    }

    /// Invite one provider to resolve an issue.
    ///
    /// Preconditions: the issue exists and belongs to the caller, the
    /// provider is registered with the caller, the issue has no current
    /// assignment (advisory; the ledger re-checks at accept time), and no
    /// `Pending` invitation to the same provider is outstanding.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::NotFound`] for an unknown issue,
    /// [`CoordinatorError::Forbidden`] when the caller does not own it,
    /// [`CoordinatorError::AssignmentTaken`] when the issue already has an
    /// assigned provider, [`CoordinatorError::Validation`] for a broken
    /// relationship precondition, [`CoordinatorError::Storage`] on storage
    /// failure.
    #[tracing::instrument(skip(self, offer_message), fields(%issue_id, %provider_id))]
    pub async fn send(
        &self,
        caller: UserId,
        issue_id: IssueId,
        provider_id: UserId,
        offer_message: Option<String>,
    ) -> Result<ServiceRequest> {
        self.check_issue_owner(issue_id, caller).await?;
        if self.ledger.assignment_for(issue_id).await?.is_some() {
            return Err(CoordinatorError::AssignmentTaken);
        }
        self.send_one(caller, issue_id, provider_id, offer_message)
            .await
    }

    /// Invite several providers at once.
    ///
    /// Issue-level preconditions (existence, ownership, no current
    /// assignment) are checked once and fail the whole call; the
    /// per-provider preconditions are applied independently, so a
    /// malformed invitation to one provider does not block the others.
    ///
    /// # Errors
    ///
    /// Issue-level failures as in [`Coordinator::send`]. Per-provider
    /// failures are reported inside the returned outcomes.
    #[tracing::instrument(skip(self, provider_ids, offer_message), fields(%issue_id))]
    pub async fn send_multiple(
        &self,
        caller: UserId,
        issue_id: IssueId,
        provider_ids: Vec<UserId>,
        offer_message: Option<String>,
    ) -> Result<Vec<SendOutcome>> {
        self.check_issue_owner(issue_id, caller).await?;
        if self.ledger.assignment_for(issue_id).await?.is_some() {
            return Err(CoordinatorError::AssignmentTaken);
        }

        let mut outcomes = Vec::with_capacity(provider_ids.len());
        for provider_id in provider_ids {
            let result = self
                .send_one(caller, issue_id, provider_id, offer_message.clone())
                .await;
            if let Err(error) = &result {
                debug!(%provider_id, %error, "invitation skipped");
            }
            outcomes.push(SendOutcome {
                provider_id,
                result,
            });
        }
        Ok(outcomes)
    }

    /// Accept a pending invitation.
    ///
    /// The ledger's atomic `try_assign` is the sole tie-break: whichever
    /// accept it serializes first wins, regardless of request creation
    /// time or client-observed send order. The loser's own request is
    /// expired and the loss is reported, never silently swallowed.
    ///
    /// When the owner cancels in the window between a winning `try_assign`
    /// and the winner's own transition, the ledger entry is rolled back.
    /// A competitor that lost against the provisional entry in that window
    /// has already expired its own request, and that row stays expired on
    /// the now-unassigned issue; the owner can re-invite that provider.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::AssignmentTaken`] when the race was lost,
    /// [`CoordinatorError::NotPending`] when the request was already
    /// responded to or withdrawn, plus the usual not-found/forbidden/
    /// storage cases.
    #[tracing::instrument(skip(self), fields(%request_id))]
    pub async fn accept(&self, caller: UserId, request_id: RequestId) -> Result<ServiceRequest> {
        let request = self.get_existing(request_id).await?;
        if request.provider_id != caller {
            return Err(CoordinatorError::Forbidden);
        }
        if request.status != RequestStatus::Pending {
            return Err(CoordinatorError::NotPending);
        }

        match self
            .ledger
            .try_assign(request.issue_id, request.provider_id)
            .await?
        {
            AssignOutcome::AlreadyAssigned => {
                // Lost the race. Expire this request so it leaves the
                // provider's pending list even if the winner's sibling
                // sweep never sees it.
                if let TransitionOutcome::Applied(expired) = self
                    .store
                    .transition(
                        request_id,
                        RequestStatus::Pending,
                        RequestStatus::Expired,
                        Some(ASSIGNMENT_TAKEN_MESSAGE.to_string()),
                    )
                    .await?
                {
                    self.dispatcher.notify(
                        expired.provider_id,
                        NotificationEvent::now(
                            expired.id,
                            expired.issue_id,
                            EventKind::RequestExpired,
                        ),
                    );
                }
                info!(%request_id, issue_id = %request.issue_id, "accept lost the assignment race");
                Err(CoordinatorError::AssignmentTaken)
            }
            AssignOutcome::Assigned => {
                let accepted = match self
                    .store
                    .transition(request_id, RequestStatus::Pending, RequestStatus::Accepted, None)
                    .await?
                {
                    TransitionOutcome::Applied(accepted) => accepted,
                    TransitionOutcome::Conflict => {
                        // The owner cancelled (or another path responded)
                        // between our status check and the transition. The
                        // ledger entry we just took must not outlive it.
                        if let ClearOutcome::NotAssigned = self
                            .ledger
                            .clear_assignment(request.issue_id, request.provider_id)
                            .await?
                        {
                            warn!(
                                issue_id = %request.issue_id,
                                "assignment vanished while rolling back a conflicted accept"
                            );
                        }
                        return Err(CoordinatorError::NotPending);
                    }
                };

                self.expire_competitors(&accepted).await?;
                self.dispatcher.notify(
                    accepted.owner_id,
                    NotificationEvent::now(
                        accepted.id,
                        accepted.issue_id,
                        EventKind::RequestAccepted,
                    ),
                );
                info!(
                    %request_id,
                    issue_id = %accepted.issue_id,
                    provider_id = %accepted.provider_id,
                    "provider assigned to issue"
                );
                Ok(accepted)
            }
        }
    }

    /// Decline a pending invitation.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::NotPending`] when the request was already
    /// responded to, plus not-found/forbidden/storage.
    #[tracing::instrument(skip(self, reason), fields(%request_id))]
    pub async fn reject(
        &self,
        caller: UserId,
        request_id: RequestId,
        reason: Option<String>,
    ) -> Result<ServiceRequest> {
        let request = self.get_existing(request_id).await?;
        if request.provider_id != caller {
            return Err(CoordinatorError::Forbidden);
        }
        let rejected = self
            .apply_transition(
                request_id,
                RequestStatus::Pending,
                RequestStatus::Rejected,
                reason.clone(),
            )
            .await?;
        self.dispatcher.notify(
            rejected.owner_id,
            NotificationEvent::now(rejected.id, rejected.issue_id, EventKind::RequestRejected)
                .with_reason(reason),
        );
        Ok(rejected)
    }

    /// Withdraw a pending invitation, owner side.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::NotPending`] when the provider already
    /// responded, plus not-found/forbidden/storage.
    #[tracing::instrument(skip(self), fields(%request_id))]
    pub async fn cancel_by_owner(
        &self,
        caller: UserId,
        request_id: RequestId,
    ) -> Result<ServiceRequest> {
        let request = self.get_existing(request_id).await?;
        if request.owner_id != caller {
            return Err(CoordinatorError::Forbidden);
        }
        let cancelled = self
            .apply_transition(
                request_id,
                RequestStatus::Pending,
                RequestStatus::Cancelled,
                None,
            )
            .await?;
        self.dispatcher.notify(
            cancelled.provider_id,
            NotificationEvent::now(cancelled.id, cancelled.issue_id, EventKind::RequestCancelled),
        );
        Ok(cancelled)
    }

    /// Step down from an issue the caller is currently assigned to.
    ///
    /// Clears the ledger entry, reopens the issue and moves the matching
    /// `Accepted` request to `Resigned`. The owner may then invite any
    /// provider afresh, including the one who resigned.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::NotFound`] when the issue has no assignment,
    /// [`CoordinatorError::Forbidden`] when someone else holds it, plus
    /// storage failures.
    #[tracing::instrument(skip(self, reason), fields(%issue_id))]
    pub async fn resign_from_issue(
        &self,
        caller: UserId,
        issue_id: IssueId,
        reason: Option<String>,
    ) -> Result<ServiceRequest> {
        match self.ledger.assignment_for(issue_id).await? {
            None => return Err(CoordinatorError::NotFound),
            Some(assigned) if assigned != caller => return Err(CoordinatorError::Forbidden),
            Some(_) => {}
        }
        if let ClearOutcome::NotAssigned =
            self.ledger.clear_assignment(issue_id, caller).await?
        {
            // Cleared by a concurrent removal between the check and here.
            return Err(CoordinatorError::NotFound);
        }

        let resigned = self
            .close_accepted(issue_id, caller, RequestStatus::Resigned, reason.clone())
            .await?;
        self.dispatcher.notify(
            resigned.owner_id,
            NotificationEvent::now(resigned.id, resigned.issue_id, EventKind::ProviderResigned)
                .with_reason(reason),
        );
        info!(%issue_id, provider_id = %caller, "provider resigned, issue reopened");
        Ok(resigned)
    }

    /// Remove the assigned provider from an issue, owner side.
    ///
    /// The mirror image of [`Coordinator::resign_from_issue`]: same ledger
    /// and issue effects, but the terminal state is `Cancelled` with the
    /// owner's reason, and the provider is the notified party. A reason is
    /// required.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::Validation`] for a missing reason or an
    /// unassigned issue, plus not-found/forbidden/storage.
    #[tracing::instrument(skip(self, reason), fields(%issue_id))]
    pub async fn remove_provider_from_issue(
        &self,
        caller: UserId,
        issue_id: IssueId,
        reason: Option<String>,
    ) -> Result<ServiceRequest> {
        let reason = match reason {
            Some(r) if !r.trim().is_empty() => r,
            _ => {
                return Err(CoordinatorError::validation(
                    "a reason is required when removing a provider",
                ));
            }
        };
        self.check_issue_owner(issue_id, caller).await?;
        let Some(provider_id) = self.ledger.assignment_for(issue_id).await? else {
            return Err(CoordinatorError::validation(
                "issue has no assigned provider",
            ));
        };
        if let ClearOutcome::NotAssigned = self
            .ledger
            .clear_assignment(issue_id, provider_id)
            .await?
        {
            return Err(CoordinatorError::validation(
                "issue has no assigned provider",
            ));
        }

        let cancelled = self
            .close_accepted(
                issue_id,
                provider_id,
                RequestStatus::Cancelled,
                Some(reason.clone()),
            )
            .await?;
        self.dispatcher.notify(
            cancelled.provider_id,
            NotificationEvent::now(cancelled.id, cancelled.issue_id, EventKind::ProviderRemoved)
                .with_reason(Some(reason)),
        );
        info!(%issue_id, %provider_id, "provider removed by owner, issue reopened");
        Ok(cancelled)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn check_issue_owner(&self, issue_id: IssueId, caller: UserId) -> Result<()> {
        let owner = self
            .directory
            .issue_owner(issue_id)
            .await?
            .ok_or(CoordinatorError::NotFound)?;
        if owner != caller {
            return Err(CoordinatorError::Forbidden);
        }
        Ok(())
    }

    async fn get_existing(&self, request_id: RequestId) -> Result<ServiceRequest> {
        self.store
            .get(request_id)
            .await?
            .ok_or(CoordinatorError::NotFound)
    }

    /// Per-provider half of `send`/`send_multiple`. Issue-level checks are
    /// the caller's responsibility.
    async fn send_one(
        &self,
        owner_id: UserId,
        issue_id: IssueId,
        provider_id: UserId,
        offer_message: Option<String>,
    ) -> Result<ServiceRequest> {
        if !self
            .directory
            .is_registered_provider(owner_id, provider_id)
            .await?
        {
            return Err(CoordinatorError::validation(
                "provider is not registered with this owner",
            ));
        }
        let created = match self
            .store
            .create(NewServiceRequest {
                issue_id,
                provider_id,
                owner_id,
                offer_message,
            })
            .await?
        {
            CreateOutcome::Created(request) => request,
            CreateOutcome::DuplicatePending => {
                return Err(CoordinatorError::validation(
                    "a pending invitation to this provider already exists",
                ));
            }
        };
        self.dispatcher.notify(
            provider_id,
            NotificationEvent::now(created.id, created.issue_id, EventKind::RequestReceived),
        );
        debug!(request_id = %created.id, %provider_id, "invitation sent");
        Ok(created)
    }

    /// Compare-and-transition, mapping a lost comparison to `NotPending`.
    async fn apply_transition(
        &self,
        request_id: RequestId,
        expected: RequestStatus,
        next: RequestStatus,
        response_message: Option<String>,
    ) -> Result<ServiceRequest> {
        match self
            .store
            .transition(request_id, expected, next, response_message)
            .await?
        {
            TransitionOutcome::Applied(request) => Ok(request),
            TransitionOutcome::Conflict => Err(CoordinatorError::NotPending),
        }
    }

    /// Expire every other `Pending` request for the winner's issue.
    ///
    /// Runs strictly after the winning transition committed, so a racing
    /// accept on a sibling observes the assignment either here or in its
    /// own `try_assign`. A sibling that responds concurrently simply makes
    /// the compare-and-transition a no-op.
    async fn expire_competitors(&self, winner: &ServiceRequest) -> Result<()> {
        let siblings = self.store.list_for_issue(winner.issue_id).await?;
        for sibling in siblings {
            if sibling.id == winner.id || sibling.status != RequestStatus::Pending {
                continue;
            }
            if let TransitionOutcome::Applied(expired) = self
                .store
                .transition(
                    sibling.id,
                    RequestStatus::Pending,
                    RequestStatus::Expired,
                    Some(ASSIGNMENT_TAKEN_MESSAGE.to_string()),
                )
                .await?
            {
                self.dispatcher.notify(
                    expired.provider_id,
                    NotificationEvent::now(expired.id, expired.issue_id, EventKind::RequestExpired),
                );
            }
        }
        Ok(())
    }

    /// Move the `Accepted` row for (issue, provider) to its terminal state
    /// after the ledger has been cleared.
    async fn close_accepted(
        &self,
        issue_id: IssueId,
        provider_id: UserId,
        terminal: RequestStatus,
        response_message: Option<String>,
    ) -> Result<ServiceRequest> {
        let accepted = self
            .store
            .find_for_issue_and_provider(issue_id, provider_id, RequestStatus::Accepted)
            .await?
            .ok_or(CoordinatorError::NotFound)?;
        self.apply_transition(
            accepted.id,
            RequestStatus::Accepted,
            terminal,
            response_message,
        )
        .await
    }
}
