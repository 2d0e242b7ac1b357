//! Axum HTTP surface for the assignment coordinator.
//!
//! Exposes the write-side operations, the read-side views and a per-user
//! WebSocket notification stream. Identity arrives in the `X-User-Id`
//! header, verified upstream by the edge proxy.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod health;
pub mod notifications;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use notifications::NotificationHub;
pub use routes::build_router;
pub use state::AppState;
