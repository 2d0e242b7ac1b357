//! Error taxonomy for coordinator operations.

use thiserror::Error;

/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// All failure modes of a mutating coordinator call.
///
/// Every mutating operation either returns the new record state or exactly
/// one of these, identifying which precondition failed. The lost accept
/// race is a reported outcome ([`CoordinatorError::AssignmentTaken`]),
/// never a silent success.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// A relationship precondition failed; nothing was mutated.
    #[error("validation failed: {reason}")]
    Validation {
        /// Which precondition failed, in user-facing terms.
        reason: String,
    },

    /// The caller is not the record's owner or provider.
    #[error("caller is not permitted to act on this record")]
    Forbidden,

    /// Unknown request or issue id.
    #[error("record not found")]
    NotFound,

    /// The request is no longer `Pending` (or no longer `Accepted`, for
    /// resignation paths).
    #[error("request is not in the required state")]
    NotPending,

    /// The accept race was lost: another provider holds the assignment and
    /// the caller's request has been expired.
    #[error("issue already has an assigned provider")]
    AssignmentTaken,

    /// Underlying storage failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl CoordinatorError {
    /// Convenience constructor for validation failures.
    #[must_use]
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is caused by the caller's input or
    /// timing rather than a system fault.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}
