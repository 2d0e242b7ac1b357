//! Write-side handlers for service requests.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use upkeep_core::types::{IssueId, RequestId, ServiceRequest, UserId};

use crate::error::AppError;
use crate::extractors::AuthenticatedUser;
use crate::state::AppState;

/// Body for `POST /service-requests/send`.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// The issue to invite the provider to.
    pub issue_id: IssueId,
    /// The provider being invited.
    pub provider_id: UserId,
    /// Optional free-text note for the provider.
    #[serde(default)]
    pub offer_message: Option<String>,
}

/// Body for `POST /service-requests/send-multiple`.
#[derive(Debug, Deserialize)]
pub struct SendMultipleRequest {
    /// The issue to invite the providers to.
    pub issue_id: IssueId,
    /// Providers to invite, processed in order.
    pub provider_ids: Vec<UserId>,
    /// Optional free-text note shared by every invitation.
    #[serde(default)]
    pub offer_message: Option<String>,
}

/// Body for handlers that accept an optional reason.
#[derive(Debug, Default, Deserialize)]
pub struct ReasonBody {
    /// Free-text reason for the action.
    #[serde(default)]
    pub reason: Option<String>,
}

/// One entry of the `send-multiple` response.
#[derive(Debug, Serialize)]
pub struct SendMultipleEntry {
    /// The provider this entry is about.
    pub provider_id: UserId,
    /// Whether an invitation was created for this provider.
    pub success: bool,
    /// Id of the created request when `success` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    /// Why this provider was skipped when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /service-requests/send`
pub async fn send(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(body): Json<SendRequest>,
) -> Result<(StatusCode, Json<ServiceRequest>), AppError> {
    let request = state
        .coordinator
        .send(caller, body.issue_id, body.provider_id, body.offer_message)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// `POST /service-requests/send-multiple`
///
/// The request fails as a whole only when the caller is not the issue
/// owner or the issue already has an assignment. Per-provider failures
/// (unknown registration, duplicate pending invitation) are reported in
/// the corresponding entry without aborting the rest.
pub async fn send_multiple(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(body): Json<SendMultipleRequest>,
) -> Result<Json<Vec<SendMultipleEntry>>, AppError> {
    let outcomes = state
        .coordinator
        .send_multiple(caller, body.issue_id, body.provider_ids, body.offer_message)
        .await?;
    let entries = outcomes
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(request) => SendMultipleEntry {
                provider_id: outcome.provider_id,
                success: true,
                request_id: Some(request.id),
                error: None,
            },
            Err(e) => SendMultipleEntry {
                provider_id: outcome.provider_id,
                success: false,
                request_id: None,
                error: Some(e.to_string()),
            },
        })
        .collect();
    Ok(Json(entries))
}

/// `POST /service-requests/:id/accept`
pub async fn accept(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(request_id): Path<RequestId>,
) -> Result<Json<ServiceRequest>, AppError> {
    let request = state.coordinator.accept(caller, request_id).await?;
    Ok(Json(request))
}

/// `POST /service-requests/:id/reject`
pub async fn reject(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(request_id): Path<RequestId>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<ServiceRequest>, AppError> {
    let request = state
        .coordinator
        .reject(caller, request_id, body.reason)
        .await?;
    Ok(Json(request))
}

/// `POST /service-requests/:id/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(request_id): Path<RequestId>,
) -> Result<Json<ServiceRequest>, AppError> {
    let request = state.coordinator.cancel_by_owner(caller, request_id).await?;
    Ok(Json(request))
}

/// `POST /service-requests/resign/:issue_id`
pub async fn resign(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(issue_id): Path<IssueId>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<ServiceRequest>, AppError> {
    let request = state
        .coordinator
        .resign_from_issue(caller, issue_id, body.reason)
        .await?;
    Ok(Json(request))
}

/// `POST /service-requests/remove-serviceman/:issue_id`
pub async fn remove_serviceman(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(issue_id): Path<IssueId>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<ServiceRequest>, AppError> {
    let request = state
        .coordinator
        .remove_provider_from_issue(caller, issue_id, body.reason)
        .await?;
    Ok(Json(request))
}
