//! Submission back-references.
//!
//! The surrounding platform owns submissions, participations and exercises.
//! Conflict handling only needs an id chain back to them, so ownership is
//! directed: the conflict holds this snapshot, never the other way around.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::exercise::ExerciseKind;

/// Id-based snapshot of the submission a causing assessment belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRef {
    pub id: i64,
    pub participation_id: i64,
    pub exercise_id: i64,
    pub kind: ExerciseKind,

    /// When the student handed the submission in.
    pub submitted_at: Option<DateTime<Utc>>,
}

impl SubmissionRef {
    pub fn new(id: i64, participation_id: i64, exercise_id: i64, kind: ExerciseKind) -> Self {
        SubmissionRef {
            id,
            participation_id,
            exercise_id,
            kind,
            submitted_at: None,
        }
    }

    pub fn submitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.submitted_at = Some(at);
        self
    }
}
