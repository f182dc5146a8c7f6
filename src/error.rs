//! Error taxonomy shared by the matchmaking and lifecycle surfaces.

use thiserror::Error;

use crate::game::state::PhaseError;

/// Errors surfaced to the transport/bootstrap layer.
///
/// Persistence and publish failures never appear here: they are logged at the
/// point of failure and do not propagate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// Malformed request (unknown mode, bad invitation).
    #[error("invalid request: {0}")]
    Validation(String),

    /// Player (or room id) is already queued, invited or playing.
    #[error("{0} is already queued or in a room")]
    DuplicateEntry(String),

    /// Unknown room or player.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not valid in the room's current phase.
    #[error(transparent)]
    Phase(#[from] PhaseError),
}

impl MatchError {
    /// Stable code sent to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            MatchError::Validation(_) => "validation_error",
            MatchError::DuplicateEntry(_) => "duplicate_entry",
            MatchError::NotFound(_) => "not_found",
            MatchError::Phase(_) => "phase_error",
        }
    }
}
