//! Feedback attached to a single item by one assessment.

use serde::{Deserialize, Serialize};

/// How a feedback entry came to be.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FeedbackKind {
    /// Suggested by the engine from graded cluster neighbors.
    Automatic,
    /// Written (or still to be written) by a human grader.
    Manual,
}

/// Feedback for one item, owned by exactly one assessment result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// Element id of the item this feedback refers to.
    pub item_id: String,

    /// Awarded credits. Absent while the item is ungraded.
    pub credits: Option<f64>,

    /// Free-text explanation shown to the student.
    pub detail_text: Option<String>,

    pub kind: FeedbackKind,
}

impl Feedback {
    pub fn manual(item_id: impl Into<String>, credits: f64) -> Self {
        Feedback {
            item_id: item_id.into(),
            credits: Some(credits),
            detail_text: None,
            kind: FeedbackKind::Manual,
        }
    }

    pub fn automatic(item_id: impl Into<String>, credits: f64, detail_text: Option<String>) -> Self {
        Feedback {
            item_id: item_id.into(),
            credits: Some(credits),
            detail_text,
            kind: FeedbackKind::Automatic,
        }
    }

    pub fn with_detail(mut self, detail_text: impl Into<String>) -> Self {
        self.detail_text = Some(detail_text.into());
        self
    }

    pub fn is_credited(&self) -> bool {
        self.credits.is_some()
    }
}
