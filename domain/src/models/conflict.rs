//! Assessment conflicts and their escalation lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::feedback::Feedback;
use super::submission::SubmissionRef;

/// Lifecycle state of an assessment conflict.
///
/// `Unhandled` is the initial state; the three `Resolved*` states are
/// terminal. Once terminal, the only mutation still permitted is an
/// instructor override, which is allowed from every non-terminal state.
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
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EscalationState {
    /// Newly detected; only the causing assessor has seen it.
    Unhandled,
    /// Escalated to the tutors whose assessments are in conflict.
    EscalatedToTutorsInConflict,
    /// Escalated to the instructor group.
    EscalatedToInstructor,
    /// The disagreement vanished before anyone acted; the causer's view stands.
    ResolvedByCauser,
    /// All conflicting tutors converged on the causing feedback.
    ResolvedByOtherTutors,
    /// An instructor decided authoritatively.
    ResolvedByInstructor,
}

impl EscalationState {
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            EscalationState::ResolvedByCauser
                | EscalationState::ResolvedByOtherTutors
                | EscalationState::ResolvedByInstructor
        )
    }
}

/// One conflicting feedback entry supplied by the similarity collaborator:
/// the feedback itself plus the result and assessor it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingFeedback {
    pub feedback: Feedback,
    pub result_id: i64,
    pub assessor_id: i64,
}

/// Pairs an item id with the assessment result that scored it.
///
/// Within one conflict no two entries may reference the same underlying
/// result. `updated_feedback` holds a tutor's pending decision once the
/// conflict has been escalated to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingResult {
    /// Element id of the disputed item, as scored by this result.
    pub item_id: String,

    /// ID of the underlying assessment result.
    pub result_id: i64,

    /// ID of the grader who produced that result.
    pub assessor_id: i64,

    /// The disputed feedback as it stood when the conflict was detected.
    pub feedback: Feedback,

    /// The tutor's decision, once submitted.
    pub updated_feedback: Option<Feedback>,
}

impl ConflictingResult {
    pub fn new(item_id: impl Into<String>, result_id: i64, assessor_id: i64, feedback: Feedback) -> Self {
        ConflictingResult {
            item_id: item_id.into(),
            result_id,
            assessor_id,
            feedback,
            updated_feedback: None,
        }
    }

    pub fn has_decided(&self) -> bool {
        self.updated_feedback.is_some()
    }
}

/// A disagreement between graders on one semantic item.
///
/// Exactly one causing conflicting result (the assessment whose feedback
/// change triggered detection) and zero or more participants. The aggregate
/// carries a version counter for optimistic concurrency: every committed
/// mutation bumps it, and a stale writer loses the compare-and-swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentConflict {
    pub id: i64,

    /// Exercise the causing assessment belongs to.
    pub exercise_id: i64,

    /// Submission the causing assessment belongs to.
    pub causing_submission: SubmissionRef,

    pub causing: ConflictingResult,

    pub participants: Vec<ConflictingResult>,

    pub state: EscalationState,

    pub creation_date: DateTime<Utc>,

    /// Set when the conflict reaches a terminal state.
    pub resolution_date: Option<DateTime<Utc>>,

    /// Optimistic concurrency version, bumped on every committed mutation.
    pub version: u64,
}

impl AssessmentConflict {
    pub fn is_resolved(&self) -> bool {
        self.state.is_resolved()
    }

    pub fn participant_for_result(&self, result_id: i64) -> Option<&ConflictingResult> {
        self.participants.iter().find(|p| p.result_id == result_id)
    }

    pub fn participant_for_result_mut(&mut self, result_id: i64) -> Option<&mut ConflictingResult> {
        self.participants.iter_mut().find(|p| p.result_id == result_id)
    }

    pub fn has_participant_for_result(&self, result_id: i64) -> bool {
        self.participant_for_result(result_id).is_some()
    }

    /// Whether every participant has submitted an updated feedback decision.
    pub fn all_participants_decided(&self) -> bool {
        self.participants.iter().all(ConflictingResult::has_decided)
    }

    /// Distinct assessor ids across all participants, in first-seen order.
    pub fn distinct_participant_assessors(&self) -> Vec<i64> {
        let mut assessors = Vec::new();
        for participant in &self.participants {
            if !assessors.contains(&participant.assessor_id) {
                assessors.push(participant.assessor_id);
            }
        }
        assessors
    }
}
