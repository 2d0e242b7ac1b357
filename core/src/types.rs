//! Domain types for the service-request assignment coordinator.
//!
//! This module contains the identifiers, the [`RequestStatus`] state machine
//! and the [`ServiceRequest`] record that the rest of the workspace operates
//! on. A `ServiceRequest` is one invitation from a property owner to one
//! service provider for one maintenance issue; it is created `Pending` and
//! reaches exactly one terminal state. Terminal rows are never deleted, they
//! are the request history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a service request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new random `RequestId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RequestId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a maintenance issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueId(Uuid);

impl IssueId {
    /// Creates a new random `IssueId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `IssueId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for IssueId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user (owner or provider).
///
/// Identity itself lives in the external authentication system; the
/// coordinator only ever compares these ids against the relationship keys
/// on a [`ServiceRequest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status state machine
// ============================================================================

/// Lifecycle status of a [`ServiceRequest`].
///
/// ```text
/// Pending  --accept (winner)-->          Accepted
/// Pending  --accept (assignment taken)-> Expired
/// Pending  --reject-->                   Rejected
/// Pending  --owner cancel-->             Cancelled
/// Accepted --resign-->                   Resigned
/// Accepted --owner remove-->             Cancelled
/// ```
///
/// `Accepted` is the only non-initial, non-terminal state: it can still move
/// to `Resigned` or `Cancelled` when the provider steps down or the owner
/// removes them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Invitation sent, awaiting the provider's response.
    Pending,
    /// Provider accepted and currently holds the issue assignment.
    Accepted,
    /// Provider declined the invitation.
    Rejected,
    /// Invalidated because a competing request was accepted.
    Expired,
    /// Provider resigned after having accepted.
    Resigned,
    /// Withdrawn by the owner, either before a response or by removing an
    /// accepted provider.
    Cancelled,
}

impl RequestStatus {
    /// Returns `true` if no further transition is possible from this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Expired | Self::Resigned | Self::Cancelled
        )
    }

    /// Returns `true` if the transition `self -> next` is legal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Accepted | Self::Rejected | Self::Expired | Self::Cancelled
            ) | (Self::Accepted, Self::Resigned | Self::Cancelled)
        )
    }

    /// Stable string form used in storage and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::Resigned => "resigned",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the stable string form produced by [`Self::as_str`].
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            "resigned" => Some(Self::Resigned),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Records
// ============================================================================

/// One invitation from an owner to one provider for one issue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Request identifier, generated at creation.
    pub id: RequestId,
    /// Issue the invitation is for.
    pub issue_id: IssueId,
    /// Invited provider.
    pub provider_id: UserId,
    /// Owner who sent the invitation.
    pub owner_id: UserId,
    /// Current lifecycle status.
    pub status: RequestStatus,
    /// Optional free text from the owner, set at creation.
    pub offer_message: Option<String>,
    /// Optional free text recorded on a terminal transition.
    pub response_message: Option<String>,
    /// Creation time, immutable.
    pub created_at: DateTime<Utc>,
    /// First transition out of `Pending` or `Accepted`; immutable once set.
    pub responded_at: Option<DateTime<Utc>>,
}

/// Input for creating a new `Pending` service request.
#[derive(Clone, Debug)]
pub struct NewServiceRequest {
    /// Issue the invitation is for.
    pub issue_id: IssueId,
    /// Invited provider.
    pub provider_id: UserId,
    /// Owner sending the invitation.
    pub owner_id: UserId,
    /// Optional free text from the owner.
    pub offer_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        let all = [
            RequestStatus::Pending,
            RequestStatus::Accepted,
            RequestStatus::Rejected,
            RequestStatus::Expired,
            RequestStatus::Resigned,
            RequestStatus::Cancelled,
        ];
        for from in all {
            for to in all {
                if from.is_terminal() {
                    assert!(
                        !from.can_transition_to(to),
                        "{from} -> {to} should be illegal"
                    );
                }
            }
        }
    }

    #[test]
    fn pending_moves_to_every_first_response() {
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Accepted));
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Rejected));
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Expired));
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Cancelled));
        assert!(!RequestStatus::Pending.can_transition_to(RequestStatus::Resigned));
        assert!(!RequestStatus::Pending.can_transition_to(RequestStatus::Pending));
    }

    #[test]
    fn accepted_is_not_terminal() {
        assert!(!RequestStatus::Accepted.is_terminal());
        assert!(RequestStatus::Accepted.can_transition_to(RequestStatus::Resigned));
        assert!(RequestStatus::Accepted.can_transition_to(RequestStatus::Cancelled));
        assert!(!RequestStatus::Accepted.can_transition_to(RequestStatus::Rejected));
    }

    #[test]
    fn status_string_round_trip() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Accepted,
            RequestStatus::Rejected,
            RequestStatus::Expired,
            RequestStatus::Resigned,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RequestStatus::parse("unknown"), None);
    }
}
