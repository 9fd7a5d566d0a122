use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response for an error
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: u16,
    pub status: String,
    pub error: String,
}

/// Failure of a single relay event.
///
/// None of these are fatal for the connection: the dispatcher logs them and
/// moves on to the next frame.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Required fields were missing or empty.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The room, file or user named by the event does not exist (anymore).
    #[error("unknown reference: {0}")]
    UnknownReference(String),

    /// The event would break a room invariant, e.g. deleting the last file.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A frame could not be decoded or encoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl RelayError {
    /// Whether the client sent something it never should have.
    ///
    /// Stale references and refused deletes are expected under concurrent
    /// editing and are not worth a warning.
    pub fn is_client_fault(&self) -> bool {
        matches!(self, RelayError::InvalidRequest(_) | RelayError::Codec(_))
    }
}
