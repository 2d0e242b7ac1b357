//! # Upkeep Core
//!
//! Domain model and assignment coordinator for the Upkeep maintenance
//! platform.
//!
//! A property owner fans a maintenance request out to one or more service
//! providers; exactly one of them becomes the assigned provider for the
//! issue. This crate holds the pieces that make that race-safe:
//!
//! - [`types`]: identifiers, the request status state machine, records
//! - [`store`]: the [`RequestStore`] seam with its compare-and-transition
//!   primitive, the single source of truth for request status
//! - [`ledger`]: the per-issue [`AssignmentLedger`] whose atomic
//!   `try_assign` is the one and only tie-break between racing accepts
//! - [`directory`]: read-only relationship lookups against the external
//!   property-management system
//! - [`coordinator`]: the [`Coordinator`] enforcing the state machine and
//!   the at-most-one-assignment invariant
//! - [`notify`]: best-effort state-change event delivery
//! - [`views`]: the read-only [`QueryViews`] the client polls
//! - [`mocks`]: in-memory implementations for tests
//!
//! ## Concurrency model
//!
//! Every operation runs on an independent request-handling task. Requests
//! are mutated only through `RequestStore::transition` and the ledger only
//! through its own atomic operations; no component caches mutable state
//! across calls. A retried call that already succeeded observes a
//! compare-and-transition conflict rather than double-applying effects.

pub mod coordinator;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod mocks;
pub mod notify;
pub mod store;
pub mod types;
pub mod views;

pub use coordinator::{ASSIGNMENT_TAKEN_MESSAGE, Coordinator, SendOutcome};
pub use directory::Directory;
pub use error::{CoordinatorError, Result};
pub use ledger::{AssignOutcome, AssignmentLedger, ClearOutcome};
pub use notify::{EventKind, NotificationDispatcher, NotificationEvent};
pub use store::{CreateOutcome, RequestStore, StatusFilter, TransitionOutcome};
pub use types::{IssueId, NewServiceRequest, RequestId, RequestStatus, ServiceRequest, UserId};
pub use views::QueryViews;
