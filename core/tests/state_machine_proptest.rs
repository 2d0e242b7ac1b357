//! Property tests for the request status state machine.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use upkeep_core::RequestStatus;

fn any_status() -> impl Strategy<Value = RequestStatus> {
    prop_oneof![
        Just(RequestStatus::Pending),
        Just(RequestStatus::Accepted),
        Just(RequestStatus::Rejected),
        Just(RequestStatus::Expired),
        Just(RequestStatus::Resigned),
        Just(RequestStatus::Cancelled),
    ]
}

proptest! {
    /// Only `Pending` and `Accepted` ever have outgoing transitions, and a
    /// status never transitions to itself.
    #[test]
    fn transitions_only_leave_live_states(from in any_status(), to in any_status()) {
        if from.can_transition_to(to) {
            prop_assert!(!from.is_terminal());
            prop_assert_ne!(from, to);
            prop_assert!(matches!(from, RequestStatus::Pending | RequestStatus::Accepted));
        }
    }

    /// A terminal status is a sink: nothing leads out of it.
    #[test]
    fn terminal_states_are_sinks(from in any_status(), to in any_status()) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(to));
        }
    }

    /// The storage string form round-trips.
    #[test]
    fn storage_form_round_trips(status in any_status()) {
        prop_assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
    }
}
