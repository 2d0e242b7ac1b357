//! Shared application state.

use crate::notifications::NotificationHub;
use std::sync::Arc;
use upkeep_core::{Coordinator, QueryViews};

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The write side.
    pub coordinator: Arc<Coordinator>,
    /// The read side.
    pub views: QueryViews,
    /// Live notification connections.
    pub hub: Arc<NotificationHub>,
}

impl AppState {
    /// Bundle the coordinator, views and hub into handler state.
    #[must_use]
    pub const fn new(
        coordinator: Arc<Coordinator>,
        views: QueryViews,
        hub: Arc<NotificationHub>,
    ) -> Self {
        Self {
            coordinator,
            views,
            hub,
        }
    }
}
