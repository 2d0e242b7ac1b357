//! Coordinator scenario and race tests.
//!
//! Exercises the assignment state machine over the in-memory mocks, whose
//! mutex-serialized primitives expose the same interleavings as the real
//! storage layer.
//!
//! Run with: `cargo test -p upkeep-core --test coordinator_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use tokio::sync::Barrier;
use upkeep_core::mocks::{
    InMemoryAssignmentLedger, InMemoryDirectory, InMemoryRequestStore, RecordingDispatcher,
};
use upkeep_core::{
    ASSIGNMENT_TAKEN_MESSAGE, AssignmentLedger, Coordinator, CoordinatorError, EventKind, IssueId,
    QueryViews, RequestId, RequestStatus, UserId,
};

struct Harness {
    coordinator: Coordinator,
    views: QueryViews,
    store: InMemoryRequestStore,
    ledger: InMemoryAssignmentLedger,
    directory: InMemoryDirectory,
    dispatcher: RecordingDispatcher,
    owner: UserId,
}

impl Harness {
    fn new() -> Self {
        let store = InMemoryRequestStore::new();
        let ledger = InMemoryAssignmentLedger::new();
        let directory = InMemoryDirectory::new();
        let dispatcher = RecordingDispatcher::new();
        let coordinator = Coordinator::new(
            Arc::new(store.clone()),
            Arc::new(ledger.clone()),
            Arc::new(directory.clone()),
            Arc::new(dispatcher.clone()),
        );
        let views = QueryViews::new(
            Arc::new(store.clone()),
            Arc::new(ledger.clone()),
            Arc::new(directory.clone()),
        );
        Self {
            coordinator,
            views,
            store,
            ledger,
            directory,
            dispatcher,
            owner: UserId::new(),
        }
    }

    fn issue(&self) -> IssueId {
        self.directory.add_issue(self.owner)
    }

    fn provider(&self) -> UserId {
        let provider = UserId::new();
        self.directory.register_provider(self.owner, provider);
        provider
    }

    async fn pending_request(&self, issue: IssueId, provider: UserId) -> RequestId {
        self.coordinator
            .send(self.owner, issue, provider, None)
            .await
            .expect("send should succeed")
            .id
    }
}

// ============================================================================
// Send
// ============================================================================

#[tokio::test]
async fn send_creates_pending_and_notifies_provider() {
    let h = Harness::new();
    let issue = h.issue();
    let provider = h.provider();

    let request = h
        .coordinator
        .send(h.owner, issue, provider, Some("leaking pipe".into()))
        .await
        .expect("send should succeed");

    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.issue_id, issue);
    assert_eq!(request.provider_id, provider);
    assert_eq!(request.owner_id, h.owner);
    assert_eq!(request.offer_message.as_deref(), Some("leaking pipe"));
    assert!(request.responded_at.is_none());

    let delivered = h.dispatcher.events_for(provider);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].kind, EventKind::RequestReceived);
    assert_eq!(delivered[0].request_id, request.id);
}

#[tokio::test]
async fn send_rejects_bad_relations() {
    let h = Harness::new();
    let issue = h.issue();
    let provider = h.provider();

    // Unknown issue.
    let err = h
        .coordinator
        .send(h.owner, IssueId::new(), provider, None)
        .await
        .unwrap_err();
    assert_eq!(err, CoordinatorError::NotFound);

    // Caller does not own the issue.
    let err = h
        .coordinator
        .send(UserId::new(), issue, provider, None)
        .await
        .unwrap_err();
    assert_eq!(err, CoordinatorError::Forbidden);

    // Provider not registered with this owner.
    let err = h
        .coordinator
        .send(h.owner, issue, UserId::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Validation { .. }));

    assert!(h.store.all().is_empty(), "no rows should have been created");
}

#[tokio::test]
async fn duplicate_pending_invitation_is_rejected_without_a_new_row() {
    let h = Harness::new();
    let issue = h.issue();
    let provider = h.provider();

    h.pending_request(issue, provider).await;
    let err = h
        .coordinator
        .send(h.owner, issue, provider, None)
        .await
        .unwrap_err();

    assert!(matches!(err, CoordinatorError::Validation { .. }));
    assert_eq!(h.store.all().len(), 1);
}

#[tokio::test]
async fn send_rejects_issue_with_active_assignment() {
    let h = Harness::new();
    let issue = h.issue();
    let provider_a = h.provider();
    let provider_b = h.provider();

    let request = h.pending_request(issue, provider_a).await;
    h.coordinator
        .accept(provider_a, request)
        .await
        .expect("accept should succeed");

    let err = h
        .coordinator
        .send(h.owner, issue, provider_b, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::AssignmentTaken));
}

#[tokio::test]
async fn send_multiple_reports_per_provider_outcomes() {
    let h = Harness::new();
    let issue = h.issue();
    let registered = h.provider();
    let stranger = UserId::new();

    let outcomes = h
        .coordinator
        .send_multiple(h.owner, issue, vec![registered, stranger], None)
        .await
        .expect("issue-level preconditions hold");

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].result.is_ok(), "registered provider succeeds");
    assert!(
        matches!(
            outcomes[1].result,
            Err(CoordinatorError::Validation { .. })
        ),
        "unregistered provider fails without blocking the other"
    );
    assert_eq!(h.store.all().len(), 1);
    assert_eq!(h.dispatcher.count_of(EventKind::RequestReceived), 1);
}

// ============================================================================
// Accept
// ============================================================================

#[tokio::test]
async fn accept_assigns_provider_and_notifies_owner() {
    let h = Harness::new();
    let issue = h.issue();
    let provider = h.provider();
    let request = h.pending_request(issue, provider).await;

    let accepted = h
        .coordinator
        .accept(provider, request)
        .await
        .expect("accept should succeed");

    assert_eq!(accepted.status, RequestStatus::Accepted);
    assert!(accepted.responded_at.is_some());
    assert_eq!(
        h.ledger.assignment_for(issue).await.unwrap(),
        Some(provider)
    );
    let owner_events = h.dispatcher.events_for(h.owner);
    assert!(
        owner_events
            .iter()
            .any(|e| e.kind == EventKind::RequestAccepted)
    );
}

#[tokio::test]
async fn accept_expires_every_pending_sibling() {
    let h = Harness::new();
    let issue = h.issue();
    let winner = h.provider();
    let losers: Vec<UserId> = (0..3).map(|_| h.provider()).collect();

    let winning_request = h.pending_request(issue, winner).await;
    for loser in &losers {
        h.pending_request(issue, *loser).await;
    }

    h.coordinator
        .accept(winner, winning_request)
        .await
        .expect("accept should succeed");

    for loser in &losers {
        let requests = h
            .views
            .pending_for_provider(*loser)
            .await
            .expect("query should succeed");
        assert!(requests.is_empty(), "no sibling may remain pending");

        let history = h.views.history_for_provider(*loser, None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, RequestStatus::Expired);
        assert_eq!(
            history[0].response_message.as_deref(),
            Some(ASSIGNMENT_TAKEN_MESSAGE)
        );
    }
    assert_eq!(h.dispatcher.count_of(EventKind::RequestExpired), 3);
}

#[tokio::test]
async fn accept_checks_identity_and_state() {
    let h = Harness::new();
    let issue = h.issue();
    let provider = h.provider();
    let request = h.pending_request(issue, provider).await;

    let err = h.coordinator.accept(UserId::new(), request).await.unwrap_err();
    assert_eq!(err, CoordinatorError::Forbidden);

    let err = h
        .coordinator
        .accept(provider, RequestId::new())
        .await
        .unwrap_err();
    assert_eq!(err, CoordinatorError::NotFound);

    h.coordinator
        .accept(provider, request)
        .await
        .expect("first accept succeeds");
    let err = h.coordinator.accept(provider, request).await.unwrap_err();
    assert_eq!(err, CoordinatorError::NotPending);
}

/// Spec scenario: A and B accept at effectively the same time; exactly one
/// wins, the ledger holds exactly one provider, every loser's request is
/// expired.
#[tokio::test]
async fn concurrent_accepts_produce_exactly_one_winner() {
    let h = Harness::new();
    let issue = h.issue();
    let contenders = 8;

    let mut requests = Vec::new();
    for _ in 0..contenders {
        let provider = h.provider();
        let request = h.pending_request(issue, provider).await;
        requests.push((provider, request));
    }

    let barrier = Arc::new(Barrier::new(contenders));
    let mut handles = Vec::new();
    for (provider, request) in requests {
        let coordinator = h.coordinator.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            coordinator.accept(provider, request).await
        }));
    }

    let mut winners = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.expect("task should not panic") {
            Ok(accepted) => {
                winners += 1;
                assert_eq!(accepted.status, RequestStatus::Accepted);
            }
            Err(CoordinatorError::AssignmentTaken) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners, 1, "exactly one accept wins");
    assert_eq!(conflicts, contenders - 1, "every other accept loses loudly");

    // Single-assignment invariant over the final state.
    let assigned = h.ledger.assignment_for(issue).await.unwrap();
    assert!(assigned.is_some());
    let rows = h.store.all();
    let accepted_rows = rows
        .iter()
        .filter(|r| r.status == RequestStatus::Accepted)
        .count();
    let pending_rows = rows
        .iter()
        .filter(|r| r.status == RequestStatus::Pending)
        .count();
    assert_eq!(accepted_rows, 1);
    assert_eq!(pending_rows, 0, "no sibling may remain pending");
}

/// Spec scenario: the owner cancels before the provider responds; the
/// provider's late accept fails and no ledger entry appears.
#[tokio::test]
async fn cancel_before_accept_leaves_no_assignment() {
    let h = Harness::new();
    let issue = h.issue();
    let provider = h.provider();
    let request = h.pending_request(issue, provider).await;

    h.coordinator
        .cancel_by_owner(h.owner, request)
        .await
        .expect("cancel should succeed");

    let err = h.coordinator.accept(provider, request).await.unwrap_err();
    assert_eq!(err, CoordinatorError::NotPending);
    assert_eq!(h.ledger.assignment_for(issue).await.unwrap(), None);

    let provider_events = h.dispatcher.events_for(provider);
    assert!(
        provider_events
            .iter()
            .any(|e| e.kind == EventKind::RequestCancelled)
    );
}

// ============================================================================
// Reject / cancel
// ============================================================================

#[tokio::test]
async fn reject_records_reason_and_notifies_owner() {
    let h = Harness::new();
    let issue = h.issue();
    let provider = h.provider();
    let request = h.pending_request(issue, provider).await;

    let rejected = h
        .coordinator
        .reject(provider, request, Some("fully booked".into()))
        .await
        .expect("reject should succeed");

    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_eq!(rejected.response_message.as_deref(), Some("fully booked"));

    let owner_events = h.dispatcher.events_for(h.owner);
    let event = owner_events
        .iter()
        .find(|e| e.kind == EventKind::RequestRejected)
        .expect("owner should be notified");
    assert_eq!(event.reason.as_deref(), Some("fully booked"));
}

#[tokio::test]
async fn cancel_is_owner_only_and_reject_is_provider_only() {
    let h = Harness::new();
    let issue = h.issue();
    let provider = h.provider();
    let request = h.pending_request(issue, provider).await;

    let err = h
        .coordinator
        .cancel_by_owner(provider, request)
        .await
        .unwrap_err();
    assert_eq!(err, CoordinatorError::Forbidden);

    let err = h.coordinator.reject(h.owner, request, None).await.unwrap_err();
    assert_eq!(err, CoordinatorError::Forbidden);
}

// ============================================================================
// Resign / remove
// ============================================================================

/// Spec scenario: accept, resign, then a fresh invitation to the same
/// provider succeeds.
#[tokio::test]
async fn resign_reopens_issue_for_fresh_invitations() {
    let h = Harness::new();
    let issue = h.issue();
    let provider = h.provider();
    let request = h.pending_request(issue, provider).await;
    h.coordinator.accept(provider, request).await.unwrap();

    let resigned = h
        .coordinator
        .resign_from_issue(provider, issue, Some("moved away".into()))
        .await
        .expect("resign should succeed");

    assert_eq!(resigned.status, RequestStatus::Resigned);
    assert_eq!(h.ledger.assignment_for(issue).await.unwrap(), None);
    let owner_events = h.dispatcher.events_for(h.owner);
    assert!(
        owner_events
            .iter()
            .any(|e| e.kind == EventKind::ProviderResigned)
    );

    // The owner may invite anyone again, including the resignee.
    let fresh = h
        .coordinator
        .send(h.owner, issue, provider, None)
        .await
        .expect("fresh invitation should succeed");
    assert_eq!(fresh.status, RequestStatus::Pending);
}

#[tokio::test]
async fn resign_requires_holding_the_assignment() {
    let h = Harness::new();
    let issue = h.issue();
    let provider = h.provider();
    let bystander = h.provider();
    let request = h.pending_request(issue, provider).await;

    // No assignment yet.
    let err = h
        .coordinator
        .resign_from_issue(provider, issue, None)
        .await
        .unwrap_err();
    assert_eq!(err, CoordinatorError::NotFound);

    h.coordinator.accept(provider, request).await.unwrap();

    // Someone else holds it.
    let err = h
        .coordinator
        .resign_from_issue(bystander, issue, None)
        .await
        .unwrap_err();
    assert_eq!(err, CoordinatorError::Forbidden);
}

#[tokio::test]
async fn remove_mirrors_resign_with_cancelled_and_provider_notification() {
    let h = Harness::new();
    let issue = h.issue();
    let provider = h.provider();
    let request = h.pending_request(issue, provider).await;
    h.coordinator.accept(provider, request).await.unwrap();

    // Reason is mandatory on the owner side.
    let err = h
        .coordinator
        .remove_provider_from_issue(h.owner, issue, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Validation { .. }));

    let removed = h
        .coordinator
        .remove_provider_from_issue(h.owner, issue, Some("poor workmanship".into()))
        .await
        .expect("removal should succeed");

    assert_eq!(removed.status, RequestStatus::Cancelled);
    assert_eq!(
        removed.response_message.as_deref(),
        Some("poor workmanship")
    );
    assert_eq!(h.ledger.assignment_for(issue).await.unwrap(), None);

    let provider_events = h.dispatcher.events_for(provider);
    let event = provider_events
        .iter()
        .find(|e| e.kind == EventKind::ProviderRemoved)
        .expect("provider should be notified");
    assert_eq!(event.reason.as_deref(), Some("poor workmanship"));
}

// ============================================================================
// Query views
// ============================================================================

#[tokio::test]
async fn views_scope_and_order_correctly() {
    let h = Harness::new();
    let issue_a = h.issue();
    let issue_b = h.issue();
    let provider = h.provider();

    let first = h.pending_request(issue_a, provider).await;
    let second = h.pending_request(issue_b, provider).await;

    assert_eq!(h.views.pending_count(provider).await.unwrap(), 2);

    h.coordinator
        .reject(provider, first, Some("too far".into()))
        .await
        .unwrap();
    h.coordinator.accept(provider, second).await.unwrap();

    let pending = h.views.pending_for_provider(provider).await.unwrap();
    assert!(pending.is_empty());
    assert_eq!(h.views.pending_count(provider).await.unwrap(), 0);

    // Most recent response first.
    let history = h.views.history_for_provider(provider, None).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second);
    assert_eq!(history[1].id, first);

    let limited = h
        .views
        .history_for_provider(provider, Some(1))
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);

    // for_issue is owner-only.
    let listed = h.views.for_issue(h.owner, issue_a).await.unwrap();
    assert_eq!(listed.len(), 1);
    let err = h.views.for_issue(provider, issue_a).await.unwrap_err();
    assert_eq!(err, CoordinatorError::Forbidden);
    let err = h.views.for_issue(h.owner, IssueId::new()).await.unwrap_err();
    assert_eq!(err, CoordinatorError::NotFound);
}

#[tokio::test]
async fn is_provider_covers_every_source() {
    let h = Harness::new();

    // Registration only.
    let registered = h.provider();
    assert!(h.views.is_provider(registered).await.unwrap());

    // Nothing at all.
    assert!(!h.views.is_provider(UserId::new()).await.unwrap());

    // Ledger assignment without a registration row: assign directly.
    let lone = UserId::new();
    let issue = h.issue();
    h.ledger.try_assign(issue, lone).await.unwrap();
    assert!(h.views.is_provider(lone).await.unwrap());
}
