//! Recording notification dispatcher for testing.

use crate::notify::{EventKind, NotificationDispatcher, NotificationEvent};
use crate::types::UserId;
use std::sync::{Arc, Mutex, PoisonError};

/// Dispatcher that records every event instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    events: Arc<Mutex<Vec<(UserId, NotificationEvent)>>>,
}

impl RecordingDispatcher {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded (recipient, event) pair, in dispatch order.
    #[must_use]
    pub fn events(&self) -> Vec<(UserId, NotificationEvent)> {
        self.locked().clone()
    }

    /// Events delivered to one user.
    #[must_use]
    pub fn events_for(&self, user_id: UserId) -> Vec<NotificationEvent> {
        self.locked()
            .iter()
            .filter(|(recipient, _)| *recipient == user_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Number of recorded events of the given kind.
    #[must_use]
    pub fn count_of(&self, kind: EventKind) -> usize {
        self.locked()
            .iter()
            .filter(|(_, event)| event.kind == kind)
            .count()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, Vec<(UserId, NotificationEvent)>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn notify(&self, user_id: UserId, event: NotificationEvent) {
        self.locked().push((user_id, event));
    }
}
