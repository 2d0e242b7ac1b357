//! Router assembly.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{requests, views};
use crate::health::{health_check, readiness_check};
use crate::notifications::websocket_handler;
use crate::state::AppState;

/// Build the full application router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let service_requests = Router::new()
        .route("/send", post(requests::send))
        .route("/send-multiple", post(requests::send_multiple))
        .route("/:id/accept", post(requests::accept))
        .route("/:id/reject", post(requests::reject))
        .route("/:id/cancel", post(requests::cancel))
        .route("/resign/:issue_id", post(requests::resign))
        .route(
            "/remove-serviceman/:issue_id",
            post(requests::remove_serviceman),
        )
        .route("/pending", get(views::pending))
        .route("/history", get(views::history))
        .route("/for-issue/:issue_id", get(views::for_issue))
        .route("/pending-count", get(views::pending_count))
        .route("/is-serviceman", get(views::is_serviceman));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/ws/notifications", get(websocket_handler))
        // Client-facing routes carry the /api prefix the edge proxy
        // routes on; probes and the WebSocket upgrade stay unprefixed.
        .nest("/api/service-requests", service_requests)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
