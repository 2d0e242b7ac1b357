//! Request extractors.
//!
//! Identity arrives in the `X-User-Id` header, placed there by the edge
//! proxy after it has verified the session. The extractor only parses the
//! value; it does not authenticate.

use crate::error::AppError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use upkeep_core::types::UserId;
use uuid::Uuid;

/// Header carrying the verified caller identity.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The verified caller, taken from [`USER_ID_HEADER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing X-User-Id header"))?;
        let id = Uuid::parse_str(value)
            .map_err(|_| AppError::unauthorized("X-User-Id is not a valid UUID"))?;
        Ok(Self(UserId::from_uuid(id)))
    }
}
