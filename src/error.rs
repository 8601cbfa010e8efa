//! Structured error taxonomy for the matching core.
//!
//! The variants map onto caller-visible classes: validation and invalid-state
//! failures are 400-equivalents, authorization failures 403, missing entities
//! 404, and everything else a 500-equivalent carrying no business detail.

use crate::state_machine::TransitionError;
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchmakerError {
    /// Malformed input or business-rule violation; retryable after the caller
    /// fixes its input
    #[error("validation error: {0}")]
    Validation(String),

    /// Order / agent / task missing
    #[error("{0} not found")]
    NotFound(String),

    /// Caller is not the creator/provider/owner it claims to be
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A lifecycle precondition failed (e.g. accepting a non-pairing order)
    #[error("invalid order state: {0}")]
    InvalidOrderState(String),

    /// The pairing handshake's time-to-live has elapsed
    #[error("pairing for order {order_id} expired at {expired_at}")]
    PairingExpired {
        order_id: uuid::Uuid,
        expired_at: chrono::DateTime<chrono::Utc>,
    },

    /// Illegal state-machine edge; always propagated, never swallowed
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Backing-store failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Coarse caller-facing classification, for layers that translate errors
/// into transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    Forbidden,
    NotFound,
    Internal,
}

impl MatchmakerError {
    pub fn classification(&self) -> ErrorClass {
        match self {
            Self::Validation(_) | Self::InvalidOrderState(_) | Self::PairingExpired { .. } => {
                ErrorClass::BadRequest
            }
            Self::Forbidden(_) => ErrorClass::Forbidden,
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::Transition(_) | Self::Storage(_) => ErrorClass::Internal,
        }
    }

    pub(crate) fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} {id}"))
    }
}

pub type Result<T> = std::result::Result<T, MatchmakerError>;
