//! Live notification delivery over WebSocket.
//!
//! The [`NotificationHub`] keeps one unbounded channel per connected user
//! and implements [`NotificationDispatcher`] by pushing events into those
//! channels. Delivery is best-effort: an event for a user with no live
//! connection is dropped, and clients reconcile through the query views
//! after reconnecting.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use upkeep_core::notify::{NotificationDispatcher, NotificationEvent};
use upkeep_core::types::UserId;

use crate::extractors::AuthenticatedUser;
use crate::state::AppState;

/// Maximum concurrent WebSocket connections.
const MAX_CONNECTIONS: usize = 10_000;

/// Seconds between server pings.
const PING_INTERVAL_SECS: u64 = 30;

/// Seconds of silence from the client before the connection is dropped.
const IDLE_TIMEOUT_SECS: u64 = 300;

/// Current number of live connections.
static ACTIVE_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

type Subscribers = HashMap<UserId, Vec<mpsc::UnboundedSender<NotificationEvent>>>;

/// Per-user registry of live notification channels.
#[derive(Default)]
pub struct NotificationHub {
    subscribers: Mutex<Subscribers>,
}

impl NotificationHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscription for the user.
    fn subscribe(&self, user_id: UserId) -> mpsc::UnboundedReceiver<NotificationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id)
            .or_default()
            .push(tx);
        rx
    }

    /// Drop closed channels for the user.
    fn prune(&self, user_id: UserId) {
        let mut guard = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(channels) = guard.get_mut(&user_id) {
            channels.retain(|tx| !tx.is_closed());
            if channels.is_empty() {
                guard.remove(&user_id);
            }
        }
    }

    /// Number of users with at least one live channel.
    #[must_use]
    pub fn connected_users(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Fan `event` out to the user's live channels, pruning closed ones.
    /// Returns how many channels took the event.
    fn deliver(&self, user_id: UserId, event: &NotificationEvent) -> u64 {
        let mut guard = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(channels) = guard.get_mut(&user_id) else {
            return 0;
        };
        let mut delivered: u64 = 0;
        channels.retain(|tx| {
            let sent = tx.send(event.clone()).is_ok();
            delivered += u64::from(sent);
            sent
        });
        if channels.is_empty() {
            guard.remove(&user_id);
        }
        delivered
    }
}

impl NotificationDispatcher for NotificationHub {
    fn notify(&self, user_id: UserId, event: NotificationEvent) {
        let kind = event.kind;
        let delivered = self.deliver(user_id, &event);
        if delivered == 0 {
            tracing::debug!(user_id = %user_id, ?kind, "No live connection, dropping event");
            metrics::counter!("notifications_dropped_total").increment(1);
        } else {
            metrics::counter!("notifications_delivered_total").increment(delivered);
        }
    }
}

/// `GET /ws/notifications` upgrade handler.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

async fn handle_socket(socket: WebSocket, user_id: UserId, state: AppState) {
    let previous = ACTIVE_CONNECTIONS.fetch_add(1, Ordering::SeqCst);
    if previous >= MAX_CONNECTIONS {
        ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::SeqCst);
        tracing::warn!(user_id = %user_id, "Connection limit reached, refusing WebSocket");
        let mut socket = socket;
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    tracing::info!(user_id = %user_id, connections = previous + 1, "WebSocket connected");
    metrics::gauge!("websocket_active_connections").increment(1.0);

    let mut events = state.hub.subscribe(user_id);
    let (mut sender, mut receiver) = socket.split();
    let mut ping = tokio::time::interval(std::time::Duration::from_secs(PING_INTERVAL_SECS));
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let idle = tokio::time::sleep(std::time::Duration::from_secs(IDLE_TIMEOUT_SECS));
    tokio::pin!(idle);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match serde_json::to_string(&event) {
                    Ok(frame) => {
                        if sender.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(user_id = %user_id, error = %e, "Failed to serialize event");
                    }
                }
            }
            _ = ping.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            () = &mut idle => {
                tracing::info!(user_id = %user_id, "WebSocket idle timeout");
                break;
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {
                        idle.as_mut().reset(
                            tokio::time::Instant::now()
                                + std::time::Duration::from_secs(IDLE_TIMEOUT_SECS),
                        );
                    }
                }
            }
        }
    }

    drop(events);
    state.hub.prune(user_id);
    let remaining = ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
    metrics::gauge!("websocket_active_connections").decrement(1.0);
    tracing::info!(user_id = %user_id, connections = remaining, "WebSocket disconnected");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use upkeep_core::notify::EventKind;
    use upkeep_core::types::{IssueId, RequestId};

    #[tokio::test]
    async fn hub_delivers_only_to_the_addressed_user() {
        let hub = NotificationHub::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let mut alice_rx = hub.subscribe(alice);
        let mut bob_rx = hub.subscribe(bob);

        let event = NotificationEvent::now(RequestId::new(), IssueId::new(), EventKind::RequestReceived);
        hub.notify(alice, event.clone());

        assert_eq!(alice_rx.recv().await.unwrap(), event);
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn hub_drops_events_for_disconnected_users() {
        let hub = NotificationHub::new();
        let user = UserId::new();
        let rx = hub.subscribe(user);
        drop(rx);

        // Closed channel is pruned on the next send.
        hub.notify(
            user,
            NotificationEvent::now(RequestId::new(), IssueId::new(), EventKind::RequestExpired),
        );
        assert_eq!(hub.connected_users(), 0);
    }

    #[tokio::test]
    async fn delivery_count_reflects_only_live_channels() {
        let hub = NotificationHub::new();
        let user = UserId::new();
        let live = hub.subscribe(user);
        let closed = hub.subscribe(user);
        drop(closed);

        let event = NotificationEvent::now(RequestId::new(), IssueId::new(), EventKind::RequestReceived);
        assert_eq!(hub.deliver(user, &event), 1);

        drop(live);
        assert_eq!(hub.deliver(user, &event), 0);
        assert_eq!(hub.connected_users(), 0);
    }

    #[tokio::test]
    async fn hub_fans_out_to_every_connection_of_a_user() {
        let hub = NotificationHub::new();
        let user = UserId::new();
        let mut first = hub.subscribe(user);
        let mut second = hub.subscribe(user);

        let event = NotificationEvent::now(RequestId::new(), IssueId::new(), EventKind::RequestAccepted);
        hub.notify(user, event.clone());

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }
}
