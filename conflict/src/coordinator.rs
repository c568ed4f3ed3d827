//! # Escalation Coordination
//!
//! Orchestrates everything around a state transition: loading and committing
//! the conflict aggregate, authorization, event dispatch, and the cascades a
//! result deletion triggers.
//!
//! Every mutation is a short read-modify-write transaction with a
//! compare-and-swap commit. When two graders race on the same conflict the
//! loser of the swap reloads the latest aggregate and reapplies its own
//! change, so the "all participants decided" condition is always evaluated
//! against a fully current participant set and the final decision triggers
//! exactly one resolution or escalation.
//!
//! Events are dispatched only after a commit succeeds. Notifications are
//! spawned and never awaited; a delivery failure is logged and dropped.

use std::sync::Arc;

use tracing::{error, info, warn};

use domain::error::{ConflictError, ConflictResult};
use domain::events::ConflictEvent;
use domain::models::conflict::AssessmentConflict;
use domain::models::feedback::Feedback;
use domain::models::result::AssessmentResult;
use domain::models::submission::SubmissionRef;

use crate::collaborators::{AssessmentApplier, AuthorizationOracle, NotificationGateway};
use crate::detector::{ConflictDetector, ConflictingFeedbackMap};
use crate::state_machine::ConflictStateMachine;
use crate::store::ConflictStore;

pub struct EscalationCoordinator {
    store: Arc<dyn ConflictStore>,
    applier: Arc<dyn AssessmentApplier>,
    notifications: Arc<dyn NotificationGateway>,
    authorization: Arc<dyn AuthorizationOracle>,
}

impl EscalationCoordinator {
    pub fn new(
        store: Arc<dyn ConflictStore>,
        applier: Arc<dyn AssessmentApplier>,
        notifications: Arc<dyn NotificationGateway>,
        authorization: Arc<dyn AuthorizationOracle>,
    ) -> Self {
        EscalationCoordinator {
            store,
            applier,
            notifications,
            authorization,
        }
    }

    /// Reconciles the conflicts of one causing result against a fresh
    /// conflicting-feedback mapping: creates conflicts for new items, merges
    /// participants for persisting ones, resolves vanished ones.
    ///
    /// Only unresolved conflicts take part: terminal conflicts stay in the
    /// store untouched, and a disagreement re-emerging on an item whose
    /// earlier conflict is resolved opens a fresh one. Returns the unresolved
    /// conflicts of the causing result after reconciliation, plus any the
    /// pass itself resolved.
    pub async fn detect_conflicts(
        &self,
        causing_result: &AssessmentResult,
        causing_submission: &SubmissionRef,
        new_conflicting_feedback: &ConflictingFeedbackMap,
    ) -> ConflictResult<Vec<AssessmentConflict>> {
        let unresolved: Vec<AssessmentConflict> = self
            .store
            .find_by_causing_result(causing_result.id)
            .await
            .into_iter()
            .filter(|conflict| !conflict.is_resolved())
            .collect();

        let mut events = Vec::new();
        let mut committed = Vec::with_capacity(unresolved.len());
        for stored in unresolved {
            let conflict_id = stored.id;
            let mut conflict = stored;
            loop {
                let conflict_events = ConflictDetector::update_existing_conflicts(
                    std::slice::from_mut(&mut conflict),
                    new_conflicting_feedback,
                )?;
                match self.store.try_update(conflict.clone()).await {
                    Ok(current) => {
                        events.extend(conflict_events);
                        committed.push(current);
                        break;
                    }
                    Err(ConflictError::StaleConflict(_)) => {
                        conflict = self.load(conflict_id).await?;
                        // A racing transition may have resolved it meanwhile.
                        if conflict.is_resolved() {
                            committed.push(conflict);
                            break;
                        }
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        let before_add = committed.len();
        ConflictDetector::add_missing_conflicts(
            causing_result,
            causing_submission,
            &mut committed,
            new_conflicting_feedback,
        );
        for conflict in committed.iter_mut().skip(before_add) {
            *conflict = self.store.insert(conflict.clone()).await;
        }

        info!(
            causing_result = causing_result.id,
            conflicts = committed.len(),
            "reconciled assessment conflicts"
        );
        self.dispatch_events(events).await;
        Ok(committed)
    }

    /// Escalates a conflict to the next authority on behalf of a user.
    pub async fn escalate(&self, conflict_id: i64, user_id: i64) -> ConflictResult<AssessmentConflict> {
        let mut conflict = self.load(conflict_id).await?;
        self.verify_responsible(&conflict, user_id).await?;

        loop {
            let events = ConflictStateMachine::escalate(&mut conflict)?;
            match self.store.try_update(conflict.clone()).await {
                Ok(committed) => {
                    self.dispatch_events(events).await;
                    return Ok(committed);
                }
                Err(ConflictError::StaleConflict(_)) => {
                    conflict = self.load(conflict_id).await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Records one tutor's decision for their conflicting result and commits
    /// the outcome. The final decision resolves or escalates the conflict; a
    /// lost compare-and-swap reapplies the decision on the fresh aggregate.
    pub async fn submit_decision(
        &self,
        conflict_id: i64,
        user_id: i64,
        participant_result_id: i64,
        decision: Feedback,
    ) -> ConflictResult<AssessmentConflict> {
        let mut conflict = self.load(conflict_id).await?;

        loop {
            let participant = conflict
                .participant_for_result(participant_result_id)
                .ok_or(ConflictError::MissingParticipant {
                    conflict_id,
                    result_id: participant_result_id,
                })?;
            let is_instructor = self
                .authorization
                .is_at_least_instructor(conflict.exercise_id, user_id)
                .await;
            if participant.assessor_id != user_id && !is_instructor {
                return Err(ConflictError::Unauthorized { user_id, conflict_id });
            }

            let events = ConflictStateMachine::update_escalated_conflict(
                &mut conflict,
                participant_result_id,
                decision.clone(),
            )?;
            match self.store.try_update(conflict.clone()).await {
                Ok(committed) => {
                    self.dispatch_events(events).await;
                    return Ok(committed);
                }
                Err(ConflictError::StaleConflict(_)) => {
                    conflict = self.load(conflict_id).await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Applies an instructor's authoritative decision to a conflict.
    pub async fn instructor_decide(
        &self,
        conflict_id: i64,
        user_id: i64,
        decision: &Feedback,
    ) -> ConflictResult<AssessmentConflict> {
        let mut conflict = self.load(conflict_id).await?;
        if !self
            .authorization
            .is_at_least_instructor(conflict.exercise_id, user_id)
            .await
        {
            return Err(ConflictError::Unauthorized { user_id, conflict_id });
        }

        loop {
            let events = ConflictStateMachine::instructor_decide(&mut conflict, decision)?;
            match self.store.try_update(conflict.clone()).await {
                Ok(committed) => {
                    self.dispatch_events(events).await;
                    return Ok(committed);
                }
                Err(ConflictError::StaleConflict(_)) => {
                    conflict = self.load(conflict_id).await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Cascades the removal of an assessment result.
    ///
    /// Conflicts the result caused are deleted outright. Conflicts it merely
    /// participated in lose that participant; a conflict whose participant
    /// set empties auto-resolves in the causer's favor, re-submitting the
    /// causing assessment once all of its conflicts are resolved.
    pub async fn on_result_removed(&self, result_id: i64) -> ConflictResult<()> {
        for conflict in self.store.find_by_causing_result(result_id).await {
            self.store.delete(conflict.id).await;
            info!(conflict_id = conflict.id, result_id, "deleted conflict of removed causing result");
        }

        for stored in self.store.find_by_participant_result(result_id).await {
            let conflict_id = stored.id;
            let mut conflict = stored;
            loop {
                conflict.participants.retain(|p| p.result_id != result_id);
                let events = if conflict.participants.is_empty() && !conflict.is_resolved() {
                    ConflictStateMachine::resolve_by_causer(&mut conflict)?
                } else {
                    Vec::new()
                };
                match self.store.try_update(conflict.clone()).await {
                    Ok(_) => {
                        self.dispatch_events(events).await;
                        break;
                    }
                    Err(ConflictError::StaleConflict(_)) => {
                        conflict = self.load(conflict_id).await?;
                    }
                    Err(ConflictError::NotFound(_)) => break,
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(())
    }

    /// Whether the user may currently act on the conflict.
    pub async fn user_is_responsible_for_handling(
        &self,
        conflict: &AssessmentConflict,
        user_id: i64,
    ) -> bool {
        let is_instructor = self
            .authorization
            .is_at_least_instructor(conflict.exercise_id, user_id)
            .await;
        ConflictStateMachine::user_is_responsible_for_handling(conflict, is_instructor, user_id)
    }

    pub async fn conflicts_for_exercise(&self, exercise_id: i64) -> Vec<AssessmentConflict> {
        self.store.find_by_exercise(exercise_id).await
    }

    /// Conflicts caused by assessments of the given submission.
    pub async fn conflicts_for_submission(&self, submission_id: i64) -> Vec<AssessmentConflict> {
        self.store.find_by_submission(submission_id).await
    }

    /// Conflicts of the submission the given user is currently responsible
    /// for handling.
    pub async fn conflicts_for_current_user_for_submission(
        &self,
        submission_id: i64,
        user_id: i64,
    ) -> Vec<AssessmentConflict> {
        let mut responsible = Vec::new();
        for conflict in self.store.find_by_submission(submission_id).await {
            if self.user_is_responsible_for_handling(&conflict, user_id).await {
                responsible.push(conflict);
            }
        }
        responsible
    }

    pub async fn unresolved_conflicts_for_result(&self, result_id: i64) -> Vec<AssessmentConflict> {
        self.store
            .find_by_causing_result(result_id)
            .await
            .into_iter()
            .filter(|conflict| !conflict.is_resolved())
            .collect()
    }

    async fn load(&self, conflict_id: i64) -> ConflictResult<AssessmentConflict> {
        self.store
            .find_by_id(conflict_id)
            .await
            .ok_or(ConflictError::NotFound(conflict_id))
    }

    async fn verify_responsible(
        &self,
        conflict: &AssessmentConflict,
        user_id: i64,
    ) -> ConflictResult<()> {
        if self.user_is_responsible_for_handling(conflict, user_id).await {
            Ok(())
        } else {
            Err(ConflictError::Unauthorized {
                user_id,
                conflict_id: conflict.id,
            })
        }
    }

    /// Delivers the events of a committed transition.
    ///
    /// Notifications are spawned and not awaited. Applier calls run inline:
    /// the transition is already committed, so a failure is logged rather
    /// than propagated.
    async fn dispatch_events(&self, events: Vec<ConflictEvent>) {
        for event in events {
            match event {
                ConflictEvent::NotifyParticipants {
                    assessor_ids,
                    exercise_id,
                    causing_assessor_id,
                } => {
                    let notifications = Arc::clone(&self.notifications);
                    tokio::spawn(async move {
                        if let Err(err) = notifications
                            .notify_participants_of_new_conflict(
                                &assessor_ids,
                                exercise_id,
                                causing_assessor_id,
                            )
                            .await
                        {
                            warn!(%err, exercise_id, "participant notification failed");
                        }
                    });
                }
                ConflictEvent::NotifyInstructors {
                    conflict_id,
                    exercise_id,
                } => {
                    let notifications = Arc::clone(&self.notifications);
                    tokio::spawn(async move {
                        if let Err(err) = notifications
                            .notify_instructors_of_escalation(conflict_id, exercise_id)
                            .await
                        {
                            warn!(%err, conflict_id, "instructor notification failed");
                        }
                    });
                }
                ConflictEvent::ApplyDecision { result_id, feedback } => {
                    if let Err(err) = self.applier.apply_decision(result_id, &feedback).await {
                        error!(%err, result_id, "failed to apply decided feedback");
                    }
                }
                ConflictEvent::SubmitAssessment {
                    result_id,
                    exercise_id,
                    submitted_at,
                } => {
                    // Re-submit only once every conflict caused by the result
                    // is resolved.
                    let all_resolved = self
                        .store
                        .find_by_causing_result(result_id)
                        .await
                        .iter()
                        .all(AssessmentConflict::is_resolved);
                    if !all_resolved {
                        continue;
                    }
                    if let Err(err) = self
                        .applier
                        .submit_assessment(result_id, exercise_id, submitted_at)
                        .await
                    {
                        error!(%err, result_id, "failed to re-submit causing assessment");
                    }
                }
            }
        }
    }
}
