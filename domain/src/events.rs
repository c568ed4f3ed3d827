//! Domain events emitted by conflict state transitions.
//!
//! Transitions stay side-effect-free: they mutate the aggregate and return
//! these events, and the coordinator delivers them only after the store
//! commit succeeds. Notifications are best-effort; appliance events push
//! resolved decisions back into the assessment store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::feedback::Feedback;

/// Side effects requested by a conflict state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ConflictEvent {
    /// Notify the distinct assessors whose results are in conflict.
    NotifyParticipants {
        assessor_ids: Vec<i64>,
        exercise_id: i64,
        causing_assessor_id: i64,
    },

    /// Notify the instructor group about an escalated conflict.
    NotifyInstructors {
        conflict_id: i64,
        exercise_id: i64,
    },

    /// Apply a decided feedback to the underlying submitted assessment.
    ApplyDecision {
        result_id: i64,
        feedback: Feedback,
    },

    /// Re-submit the causing assessment once all its conflicts are resolved.
    SubmitAssessment {
        result_id: i64,
        exercise_id: i64,
        submitted_at: Option<DateTime<Utc>>,
    },
}
