//! Error taxonomy for conflict handling.
//!
//! Statistical edge cases (empty cluster, no credited items) are not
//! errors; they are represented as `None` by the statistics functions.
//! `StaleConflict` is the one variant a coordinator may handle by reloading
//! and reapplying; the rest surface to the caller unchanged.

use crate::models::conflict::EscalationState;

/// Result type for conflict operations.
pub type ConflictResult<T> = Result<T, ConflictError>;

/// Errors that can occur while detecting, escalating or resolving
/// assessment conflicts.
#[derive(Debug, thiserror::Error)]
pub enum ConflictError {
    #[error("Conflict {0} does not exist")]
    NotFound(i64),

    #[error("Conflict {0} has already been resolved")]
    AlreadyResolved(i64),

    #[error("Conflict {conflict_id} cannot be escalated from state {state}")]
    IllegalTransition { conflict_id: i64, state: EscalationState },

    #[error("Result {result_id} is not a participant of conflict {conflict_id}")]
    MissingParticipant { conflict_id: i64, result_id: i64 },

    #[error("User {user_id} is not responsible for handling conflict {conflict_id}")]
    Unauthorized { user_id: i64, conflict_id: i64 },

    #[error("Conflict {0} was modified concurrently and could not be committed")]
    StaleConflict(i64),
}
