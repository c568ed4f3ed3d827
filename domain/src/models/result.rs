//! A single grader's assessment of one submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::feedback::Feedback;

/// One assessment of a submission: an assessor, the feedback set they
/// produced, and a completion timestamp that stays empty while the
/// assessment is still in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub id: i64,

    /// ID of the submission this result assesses.
    pub submission_id: i64,

    /// ID of the grader who produced this result.
    pub assessor_id: i64,

    /// When the assessment was completed. `None` while in progress.
    pub completion_date: Option<DateTime<Utc>>,

    /// Feedback entries, at most one per item.
    pub feedback: Vec<Feedback>,
}

impl AssessmentResult {
    pub fn new(id: i64, submission_id: i64, assessor_id: i64) -> Self {
        AssessmentResult {
            id,
            submission_id,
            assessor_id,
            completion_date: None,
            feedback: Vec::new(),
        }
    }

    pub fn feedback_for_item(&self, item_id: &str) -> Option<&Feedback> {
        self.feedback.iter().find(|f| f.item_id == item_id)
    }

    pub fn is_completed(&self) -> bool {
        self.completion_date.is_some()
    }
}
