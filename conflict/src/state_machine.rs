//! # Conflict State Machine
//!
//! The authoritative lifecycle of one assessment conflict. Escalation walks
//! `Unhandled` to `EscalatedToTutorsInConflict` to `EscalatedToInstructor`;
//! resolution ends in `ResolvedByCauser`, `ResolvedByOtherTutors` or
//! `ResolvedByInstructor` depending on who settled the disagreement.
//!
//! Transitions are side-effect-free: they mutate the aggregate in place and
//! return the [`ConflictEvent`]s to deliver once the aggregate has been
//! committed. Acting on a terminal conflict fails with `AlreadyResolved`
//! except for the instructor override, which is permitted from every
//! non-terminal state.

use chrono::Utc;
use tracing::warn;

use domain::error::{ConflictError, ConflictResult};
use domain::events::ConflictEvent;
use domain::models::conflict::{AssessmentConflict, EscalationState};
use domain::models::feedback::Feedback;

pub struct ConflictStateMachine;

impl ConflictStateMachine {
    /// Escalates the conflict to the next authority.
    ///
    /// `Unhandled` conflicts go to the tutors whose assessments are in
    /// conflict; tutor-level conflicts go to the instructor group. There is
    /// no escalation target beyond the instructor.
    pub fn escalate(conflict: &mut AssessmentConflict) -> ConflictResult<Vec<ConflictEvent>> {
        Self::verify_not_resolved(conflict)?;
        match conflict.state {
            EscalationState::Unhandled => {
                conflict.state = EscalationState::EscalatedToTutorsInConflict;
                Ok(vec![ConflictEvent::NotifyParticipants {
                    assessor_ids: conflict.distinct_participant_assessors(),
                    exercise_id: conflict.exercise_id,
                    causing_assessor_id: conflict.causing.assessor_id,
                }])
            }
            EscalationState::EscalatedToTutorsInConflict => {
                conflict.state = EscalationState::EscalatedToInstructor;
                Ok(vec![ConflictEvent::NotifyInstructors {
                    conflict_id: conflict.id,
                    exercise_id: conflict.exercise_id,
                }])
            }
            state => {
                warn!(conflict_id = conflict.id, %state, "conflict cannot be escalated further");
                Err(ConflictError::IllegalTransition {
                    conflict_id: conflict.id,
                    state,
                })
            }
        }
    }

    /// Resolves the conflict from the causing tutor's side.
    ///
    /// An `Unhandled` conflict resolves as `ResolvedByCauser` (the
    /// disagreement vanished before anyone acted). A tutor-level conflict
    /// resolves as `ResolvedByOtherTutors` and applies every participant's
    /// decision to the underlying assessments; callers invoke this only once
    /// all participants have decided uniformly.
    pub fn resolve(conflict: &mut AssessmentConflict) -> ConflictResult<Vec<ConflictEvent>> {
        Self::verify_not_resolved(conflict)?;
        match conflict.state {
            EscalationState::Unhandled => {
                conflict.state = EscalationState::ResolvedByCauser;
                conflict.resolution_date = Some(Utc::now());
                Ok(vec![Self::submit_causing_event(conflict)])
            }
            EscalationState::EscalatedToTutorsInConflict => {
                let mut events: Vec<ConflictEvent> = conflict
                    .participants
                    .iter()
                    .filter_map(|participant| {
                        participant.updated_feedback.as_ref().map(|decision| {
                            ConflictEvent::ApplyDecision {
                                result_id: participant.result_id,
                                feedback: decision.clone(),
                            }
                        })
                    })
                    .collect();
                conflict.state = EscalationState::ResolvedByOtherTutors;
                conflict.resolution_date = Some(Utc::now());
                events.push(Self::submit_causing_event(conflict));
                Ok(events)
            }
            state => Err(ConflictError::IllegalTransition {
                conflict_id: conflict.id,
                state,
            }),
        }
    }

    /// Resolves the conflict as `ResolvedByCauser` from any non-terminal
    /// state. Used when the participant set empties out (every other
    /// assessment in the disagreement was deleted), leaving nothing to argue
    /// about.
    pub fn resolve_by_causer(
        conflict: &mut AssessmentConflict,
    ) -> ConflictResult<Vec<ConflictEvent>> {
        Self::verify_not_resolved(conflict)?;
        conflict.state = EscalationState::ResolvedByCauser;
        conflict.resolution_date = Some(Utc::now());
        Ok(vec![Self::submit_causing_event(conflict)])
    }

    /// Applies an instructor's authoritative decision.
    ///
    /// Permitted from every non-terminal state regardless of how many
    /// participants already decided. Overwrites the causing feedback and all
    /// participant feedbacks with the decision's credits and applies each to
    /// its underlying assessment.
    pub fn instructor_decide(
        conflict: &mut AssessmentConflict,
        decision: &Feedback,
    ) -> ConflictResult<Vec<ConflictEvent>> {
        Self::verify_not_resolved(conflict)?;

        let mut events = Vec::with_capacity(conflict.participants.len() + 2);

        conflict.causing.feedback.credits = decision.credits;
        events.push(ConflictEvent::ApplyDecision {
            result_id: conflict.causing.result_id,
            feedback: conflict.causing.feedback.clone(),
        });
        for participant in &mut conflict.participants {
            participant.feedback.credits = decision.credits;
            events.push(ConflictEvent::ApplyDecision {
                result_id: participant.result_id,
                feedback: participant.feedback.clone(),
            });
        }

        conflict.state = EscalationState::ResolvedByInstructor;
        conflict.resolution_date = Some(Utc::now());
        events.push(Self::submit_causing_event(conflict));
        Ok(events)
    }

    /// Records one participant's decision on an escalated conflict, then
    /// re-evaluates the aggregate.
    ///
    /// Only once **every** participant has decided does the conflict move on:
    /// uniform decisions matching the causing feedback resolve it, anything
    /// else escalates it to the instructor. Until then the conflict stays
    /// pending and no events are emitted.
    pub fn update_escalated_conflict(
        conflict: &mut AssessmentConflict,
        result_id: i64,
        decision: Feedback,
    ) -> ConflictResult<Vec<ConflictEvent>> {
        Self::verify_not_resolved(conflict)?;
        if conflict.state != EscalationState::EscalatedToTutorsInConflict {
            return Err(ConflictError::IllegalTransition {
                conflict_id: conflict.id,
                state: conflict.state,
            });
        }

        let conflict_id = conflict.id;
        let participant = conflict
            .participant_for_result_mut(result_id)
            .ok_or(ConflictError::MissingParticipant {
                conflict_id,
                result_id,
            })?;
        participant.updated_feedback = Some(decision);

        if !conflict.all_participants_decided() {
            return Ok(Vec::new());
        }

        if Self::all_tutors_accepted_causing_feedback(conflict) {
            Self::resolve(conflict)
        } else {
            Self::escalate(conflict)
        }
    }

    /// Whether the user may act on the conflict in its current state.
    ///
    /// Instructors are always responsible (the caller resolves that through
    /// the authorization oracle and passes it in). Otherwise responsibility
    /// follows the state: the causing assessor while unhandled, any
    /// participant assessor while escalated to the tutors, nobody after that.
    pub fn user_is_responsible_for_handling(
        conflict: &AssessmentConflict,
        is_at_least_instructor: bool,
        user_id: i64,
    ) -> bool {
        if is_at_least_instructor {
            return true;
        }
        match conflict.state {
            EscalationState::Unhandled => conflict.causing.assessor_id == user_id,
            EscalationState::EscalatedToTutorsInConflict => conflict
                .participants
                .iter()
                .any(|participant| participant.assessor_id == user_id),
            _ => false,
        }
    }

    /// Every participant decided the same credits, and those credits match
    /// the causing feedback.
    fn all_tutors_accepted_causing_feedback(conflict: &AssessmentConflict) -> bool {
        let first_decision = match conflict
            .participants
            .first()
            .and_then(|participant| participant.updated_feedback.as_ref())
        {
            Some(decision) => decision,
            None => return false,
        };

        let uniform = conflict.participants.iter().all(|participant| {
            participant
                .updated_feedback
                .as_ref()
                .is_some_and(|decision| decision.credits == first_decision.credits)
        });

        uniform && conflict.causing.feedback.credits == first_decision.credits
    }

    fn submit_causing_event(conflict: &AssessmentConflict) -> ConflictEvent {
        ConflictEvent::SubmitAssessment {
            result_id: conflict.causing.result_id,
            exercise_id: conflict.exercise_id,
            submitted_at: conflict.causing_submission.submitted_at,
        }
    }

    fn verify_not_resolved(conflict: &AssessmentConflict) -> ConflictResult<()> {
        if conflict.is_resolved() {
            warn!(conflict_id = conflict.id, state = %conflict.state, "conflict already resolved");
            return Err(ConflictError::AlreadyResolved(conflict.id));
        }
        Ok(())
    }
}
