//! State-change event delivery.
//!
//! The coordinator reports every state change to the interested parties
//! through [`NotificationDispatcher::notify`]. Delivery is best-effort and
//! fire-and-forget with respect to the transaction that produced the
//! change: a dispatch failure is recovered locally by the implementation
//! (logged, counted) and never rolls back or delays the state transition.
//! Delivery is at-most-once per event generation and is not replayed on
//! reconnect; a client that misses an event reconciles through the query
//! views.

use crate::types::{IssueId, RequestId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a service request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A new invitation was sent to the notified provider.
    RequestReceived,
    /// The notified owner's invitation was accepted.
    RequestAccepted,
    /// The notified owner's invitation was rejected.
    RequestRejected,
    /// The notified provider's pending invitation was invalidated by a
    /// sibling's acceptance.
    RequestExpired,
    /// The notified provider's pending invitation was withdrawn by the
    /// owner.
    RequestCancelled,
    /// The notified owner's assigned provider resigned.
    ProviderResigned,
    /// The notified provider was removed from the issue by the owner.
    ProviderRemoved,
}

/// One state-change event, as delivered to a connected client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// The request the event is about.
    pub request_id: RequestId,
    /// The issue the request belongs to.
    pub issue_id: IssueId,
    /// What happened.
    pub kind: EventKind,
    /// When the event was generated.
    pub timestamp: DateTime<Utc>,
    /// Free-text reason, present for rejections, cancellations, removals
    /// and resignations when one was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl NotificationEvent {
    /// Build an event stamped with the current time.
    #[must_use]
    pub fn now(request_id: RequestId, issue_id: IssueId, kind: EventKind) -> Self {
        Self {
            request_id,
            issue_id,
            kind,
            timestamp: Utc::now(),
            reason: None,
        }
    }

    /// Attach a free-text reason.
    #[must_use]
    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }
}

/// Best-effort sink for state-change events.
///
/// `notify` is synchronous and non-blocking: implementations enqueue the
/// event (or drop it when the user has no live connection) and return
/// immediately, so a slow or absent client can never hold up a state
/// transition.
pub trait NotificationDispatcher: Send + Sync {
    /// Deliver `event` to `user_id`, best-effort.
    fn notify(&self, user_id: UserId, event: NotificationEvent);
}
