//! Read-side handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use upkeep_core::types::{IssueId, ServiceRequest};

use crate::error::AppError;
use crate::extractors::AuthenticatedUser;
use crate::state::AppState;

/// Query string for `GET /service-requests/history`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of entries to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Response body for `GET /service-requests/pending-count`.
#[derive(Debug, Serialize)]
pub struct PendingCountResponse {
    /// Number of open invitations addressed to the caller.
    pub count: u64,
}

/// Response body for `GET /service-requests/is-serviceman`.
#[derive(Debug, Serialize)]
pub struct IsServicemanResponse {
    /// Whether the caller acts as a provider anywhere.
    pub is_serviceman: bool,
}

/// `GET /service-requests/pending`
pub async fn pending(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> Result<Json<Vec<ServiceRequest>>, AppError> {
    Ok(Json(state.views.pending_for_provider(caller).await?))
}

/// `GET /service-requests/history?limit=N`
pub async fn history(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ServiceRequest>>, AppError> {
    Ok(Json(
        state.views.history_for_provider(caller, query.limit).await?,
    ))
}

/// `GET /service-requests/for-issue/:issue_id`
pub async fn for_issue(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(issue_id): Path<IssueId>,
) -> Result<Json<Vec<ServiceRequest>>, AppError> {
    Ok(Json(state.views.for_issue(caller, issue_id).await?))
}

/// `GET /service-requests/pending-count`
pub async fn pending_count(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> Result<Json<PendingCountResponse>, AppError> {
    let count = state.views.pending_count(caller).await?;
    Ok(Json(PendingCountResponse { count }))
}

/// `GET /service-requests/is-serviceman`
pub async fn is_serviceman(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> Result<Json<IsServicemanResponse>, AppError> {
    let is_serviceman = state.views.is_provider(caller).await?;
    Ok(Json(IsServicemanResponse { is_serviceman }))
}
