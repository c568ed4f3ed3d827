//! # Conflict Detection
//!
//! Turns the similarity collaborator's "conflicting feedback" mapping into
//! conflict create, update and resolve operations. The mapping keys are the
//! item ids of the causing result's feedback; each value lists the existing
//! feedback entries (from other assessments) the causing feedback disagrees
//! with.

use std::collections::HashMap;

use chrono::Utc;
use tracing::debug;

use domain::error::ConflictResult;
use domain::events::ConflictEvent;
use domain::models::conflict::{
    AssessmentConflict, ConflictingFeedback, ConflictingResult, EscalationState,
};
use domain::models::result::AssessmentResult;
use domain::models::submission::SubmissionRef;

use crate::state_machine::ConflictStateMachine;

/// Conflicting feedback per item id, as supplied by the similarity
/// collaborator for one causing result.
pub type ConflictingFeedbackMap = HashMap<String, Vec<ConflictingFeedback>>;

pub struct ConflictDetector;

impl ConflictDetector {
    /// Creates a new unhandled conflict for every mapping entry that has no
    /// unresolved conflict on the same item id yet (a disagreement re-emerging
    /// after an earlier conflict was resolved opens a fresh one). New
    /// conflicts are appended to `existing_conflicts` with an unassigned id;
    /// the store assigns ids on insert.
    pub fn add_missing_conflicts(
        causing_result: &AssessmentResult,
        causing_submission: &SubmissionRef,
        existing_conflicts: &mut Vec<AssessmentConflict>,
        new_conflicting_feedback: &ConflictingFeedbackMap,
    ) {
        for (item_id, feedback_in_conflict) in new_conflicting_feedback {
            let already_tracked = existing_conflicts
                .iter()
                .any(|conflict| !conflict.is_resolved() && conflict.causing.item_id == *item_id);
            if already_tracked {
                continue;
            }
            let Some(causing_feedback) = causing_result.feedback_for_item(item_id) else {
                continue;
            };

            debug!(
                item_id = %item_id,
                causing_result = causing_result.id,
                participants = feedback_in_conflict.len(),
                "detected new assessment conflict"
            );
            existing_conflicts.push(AssessmentConflict {
                id: 0,
                exercise_id: causing_submission.exercise_id,
                causing_submission: causing_submission.clone(),
                causing: ConflictingResult::new(
                    item_id.clone(),
                    causing_result.id,
                    causing_result.assessor_id,
                    causing_feedback.clone(),
                ),
                participants: Self::participants_from(feedback_in_conflict),
                state: EscalationState::Unhandled,
                creation_date: Utc::now(),
                resolution_date: None,
                version: 0,
            });
        }
    }

    /// Reconciles existing conflicts of one causing result against the fresh
    /// mapping. Conflicts whose item still has conflicting feedback get their
    /// participant set merged; conflicts whose item vanished from the mapping
    /// are resolved without a manual decision (the causer's view prevailed).
    /// Terminal conflicts are left untouched.
    ///
    /// Returns the events requested by any resolution transitions.
    pub fn update_existing_conflicts(
        existing_conflicts: &mut [AssessmentConflict],
        new_conflicting_feedback: &ConflictingFeedbackMap,
    ) -> ConflictResult<Vec<ConflictEvent>> {
        let mut events = Vec::new();
        for conflict in existing_conflicts.iter_mut() {
            if conflict.is_resolved() {
                continue;
            }
            match new_conflicting_feedback.get(&conflict.causing.item_id) {
                Some(feedback_in_conflict) => {
                    Self::merge_participants(conflict, feedback_in_conflict);
                }
                None => {
                    events.extend(ConflictStateMachine::resolve(conflict)?);
                }
            }
        }
        Ok(events)
    }

    /// Adds participants for conflicting feedback entries whose result is not
    /// yet part of the conflict. One entry per underlying result.
    fn merge_participants(
        conflict: &mut AssessmentConflict,
        feedback_in_conflict: &[ConflictingFeedback],
    ) {
        for entry in feedback_in_conflict {
            if conflict.has_participant_for_result(entry.result_id) {
                continue;
            }
            conflict.participants.push(ConflictingResult::new(
                entry.feedback.item_id.clone(),
                entry.result_id,
                entry.assessor_id,
                entry.feedback.clone(),
            ));
        }
    }

    fn participants_from(feedback_in_conflict: &[ConflictingFeedback]) -> Vec<ConflictingResult> {
        let mut participants: Vec<ConflictingResult> = Vec::new();
        for entry in feedback_in_conflict {
            // Never two participants for the same underlying result.
            if participants.iter().any(|p| p.result_id == entry.result_id) {
                continue;
            }
            participants.push(ConflictingResult::new(
                entry.feedback.item_id.clone(),
                entry.result_id,
                entry.assessor_id,
                entry.feedback.clone(),
            ));
        }
        participants
    }
}
