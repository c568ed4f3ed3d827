//! End-to-end tests for conflict detection, escalation and resolution
//! through the coordinator, with recording collaborator doubles.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use conflict::collaborators::{
    AssessmentApplier, AuthorizationOracle, CollaboratorError, NotificationGateway,
};
use conflict::coordinator::EscalationCoordinator;
use conflict::detector::ConflictingFeedbackMap;
use conflict::store::{ConflictStore, InMemoryConflictStore};
use domain::error::ConflictError;
use domain::models::conflict::{ConflictingFeedback, EscalationState};
use domain::models::exercise::ExerciseKind;
use domain::models::feedback::Feedback;
use domain::models::result::AssessmentResult;
use domain::models::submission::SubmissionRef;

#[derive(Default)]
struct RecordingNotifications {
    participant_calls: Mutex<Vec<(Vec<i64>, i64, i64)>>,
    instructor_calls: Mutex<Vec<(i64, i64)>>,
}

#[async_trait]
impl NotificationGateway for RecordingNotifications {
    async fn notify_participants_of_new_conflict(
        &self,
        assessor_ids: &[i64],
        exercise_id: i64,
        causing_assessor_id: i64,
    ) -> Result<(), CollaboratorError> {
        self.participant_calls.lock().unwrap().push((
            assessor_ids.to_vec(),
            exercise_id,
            causing_assessor_id,
        ));
        Ok(())
    }

    async fn notify_instructors_of_escalation(
        &self,
        conflict_id: i64,
        exercise_id: i64,
    ) -> Result<(), CollaboratorError> {
        self.instructor_calls
            .lock()
            .unwrap()
            .push((conflict_id, exercise_id));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingApplier {
    applied: Mutex<Vec<(i64, Feedback)>>,
    submitted: Mutex<Vec<i64>>,
}

#[async_trait]
impl AssessmentApplier for RecordingApplier {
    async fn apply_decision(
        &self,
        result_id: i64,
        feedback: &Feedback,
    ) -> Result<(), CollaboratorError> {
        self.applied.lock().unwrap().push((result_id, feedback.clone()));
        Ok(())
    }

    async fn submit_assessment(
        &self,
        result_id: i64,
        _exercise_id: i64,
        _submitted_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<(), CollaboratorError> {
        self.submitted.lock().unwrap().push(result_id);
        Ok(())
    }
}

struct StaticRoles {
    instructors: Vec<i64>,
}

#[async_trait]
impl AuthorizationOracle for StaticRoles {
    async fn is_at_least_instructor(&self, _exercise_id: i64, user_id: i64) -> bool {
        self.instructors.contains(&user_id)
    }
}

struct Fixture {
    coordinator: EscalationCoordinator,
    store: Arc<InMemoryConflictStore>,
    notifications: Arc<RecordingNotifications>,
    applier: Arc<RecordingApplier>,
}

/// Instructor user id used by every fixture.
const INSTRUCTOR: i64 = 900;
/// Causing assessor user id.
const CAUSER: i64 = 50;

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryConflictStore::new());
    let notifications = Arc::new(RecordingNotifications::default());
    let applier = Arc::new(RecordingApplier::default());
    let authorization = Arc::new(StaticRoles {
        instructors: vec![INSTRUCTOR],
    });
    let coordinator = EscalationCoordinator::new(
        store.clone(),
        applier.clone(),
        notifications.clone(),
        authorization,
    );
    Fixture {
        coordinator,
        store,
        notifications,
        applier,
    }
}

fn causing_result() -> AssessmentResult {
    let mut result = AssessmentResult::new(1, 100, CAUSER);
    result.feedback = vec![Feedback::manual("el-1", 1.0)];
    result
}

fn causing_submission() -> SubmissionRef {
    SubmissionRef::new(100, 200, 10, ExerciseKind::Modeling)
}

fn conflicting(result_id: i64, assessor_id: i64, credits: f64) -> ConflictingFeedback {
    ConflictingFeedback {
        feedback: Feedback::manual("el-9", credits),
        result_id,
        assessor_id,
    }
}

/// Detects one conflict on item `el-1` with participants (result 2, tutor 60)
/// and (result 3, tutor 61), returning its id.
async fn detected_conflict(fx: &Fixture) -> i64 {
    let mut mapping = ConflictingFeedbackMap::new();
    mapping.insert(
        "el-1".into(),
        vec![conflicting(2, 60, 2.0), conflicting(3, 61, 3.0)],
    );
    let conflicts = fx
        .coordinator
        .detect_conflicts(&causing_result(), &causing_submission(), &mapping)
        .await
        .unwrap();
    conflicts[0].id
}

/// Waits for a fire-and-forget notification to land.
async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not met within timeout");
}

#[tokio::test]
async fn detection_creates_unhandled_conflicts() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;

    let stored = fx.store.find_by_id(id).await.unwrap();
    assert_eq!(stored.state, EscalationState::Unhandled);
    assert_eq!(stored.participants.len(), 2);
    assert_eq!(stored.causing.result_id, 1);
}

#[tokio::test]
async fn detection_resolves_vanished_conflicts_and_resubmits() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;

    // Second detection pass with an empty mapping: the disagreement is gone.
    let conflicts = fx
        .coordinator
        .detect_conflicts(&causing_result(), &causing_submission(), &ConflictingFeedbackMap::new())
        .await
        .unwrap();

    assert_eq!(conflicts[0].id, id);
    assert_eq!(conflicts[0].state, EscalationState::ResolvedByCauser);
    // All conflicts of the causing result are resolved, so it was re-submitted.
    assert_eq!(*fx.applier.submitted.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn redetection_after_resolution_skips_terminal_conflicts() {
    let fx = fixture();
    detected_conflict(&fx).await;

    // Second pass resolves the conflict (the disagreement vanished); routine
    // third and fourth passes must not trip over the terminal aggregate.
    fx.coordinator
        .detect_conflicts(&causing_result(), &causing_submission(), &ConflictingFeedbackMap::new())
        .await
        .unwrap();
    let third = fx
        .coordinator
        .detect_conflicts(&causing_result(), &causing_submission(), &ConflictingFeedbackMap::new())
        .await
        .unwrap();
    assert!(third.is_empty());
}

#[tokio::test]
async fn reemerged_disagreement_on_resolved_item_opens_a_fresh_conflict() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;
    fx.coordinator
        .instructor_decide(id, INSTRUCTOR, &Feedback::manual("el-1", 1.0))
        .await
        .unwrap();

    // The same item falls into disagreement again with a different tutor.
    let mut mapping = ConflictingFeedbackMap::new();
    mapping.insert("el-1".into(), vec![conflicting(4, 62, 0.5)]);
    let conflicts = fx
        .coordinator
        .detect_conflicts(&causing_result(), &causing_submission(), &mapping)
        .await
        .unwrap();

    assert_eq!(conflicts.len(), 1);
    assert_ne!(conflicts[0].id, id);
    assert_eq!(conflicts[0].state, EscalationState::Unhandled);
    assert_eq!(conflicts[0].participants.len(), 1);
    assert_eq!(conflicts[0].participants[0].result_id, 4);
    assert_eq!(fx.coordinator.unresolved_conflicts_for_result(1).await.len(), 1);

    // The earlier conflict keeps its terminal state and participant set.
    let resolved = fx.store.find_by_id(id).await.unwrap();
    assert_eq!(resolved.state, EscalationState::ResolvedByInstructor);
    assert_eq!(resolved.participants.len(), 2);
}

#[tokio::test]
async fn detection_racing_an_escalation_commits_both() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;

    let mut mapping = ConflictingFeedbackMap::new();
    mapping.insert(
        "el-1".into(),
        vec![conflicting(2, 60, 2.0), conflicting(3, 61, 3.0), conflicting(4, 62, 0.5)],
    );
    let result = causing_result();
    let submission = causing_submission();
    let detection = fx
        .coordinator
        .detect_conflicts(&result, &submission, &mapping);
    let escalation = fx.coordinator.escalate(id, CAUSER);
    let (detection, escalation) = futures::join!(detection, escalation);
    detection.unwrap();
    escalation.unwrap();

    // Whoever lost the swap reapplied on the fresh aggregate.
    let stored = fx.store.find_by_id(id).await.unwrap();
    assert_eq!(stored.state, EscalationState::EscalatedToTutorsInConflict);
    assert_eq!(stored.participants.len(), 3);
}

#[tokio::test]
async fn escalating_unhandled_notifies_distinct_participant_assessors() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;

    let escalated = fx.coordinator.escalate(id, CAUSER).await.unwrap();
    assert_eq!(escalated.state, EscalationState::EscalatedToTutorsInConflict);

    eventually(|| !fx.notifications.participant_calls.lock().unwrap().is_empty()).await;
    let calls = fx.notifications.participant_calls.lock().unwrap();
    assert_eq!(calls.as_slice(), &[(vec![60, 61], 10, CAUSER)]);
}

#[tokio::test]
async fn only_responsible_users_can_escalate() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;

    // A participant tutor is not responsible while the conflict is unhandled.
    let err = fx.coordinator.escalate(id, 60).await.unwrap_err();
    assert!(matches!(err, ConflictError::Unauthorized { user_id: 60, .. }));

    // An instructor always is.
    fx.coordinator.escalate(id, INSTRUCTOR).await.unwrap();
}

#[tokio::test]
async fn escalating_resolved_conflict_fails_with_already_resolved() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;
    fx.coordinator
        .instructor_decide(id, INSTRUCTOR, &Feedback::manual("el-1", 1.0))
        .await
        .unwrap();

    let err = fx.coordinator.escalate(id, INSTRUCTOR).await.unwrap_err();
    assert!(matches!(err, ConflictError::AlreadyResolved(_)));
}

#[tokio::test]
async fn missing_conflict_fails_with_not_found() {
    let fx = fixture();
    let err = fx.coordinator.escalate(4242, INSTRUCTOR).await.unwrap_err();
    assert!(matches!(err, ConflictError::NotFound(4242)));
}

#[tokio::test]
async fn agreeing_decisions_resolve_by_other_tutors_and_apply_credits() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;
    fx.coordinator.escalate(id, CAUSER).await.unwrap();

    fx.coordinator
        .submit_decision(id, 60, 2, Feedback::manual("el-1", 1.0))
        .await
        .unwrap();
    let resolved = fx
        .coordinator
        .submit_decision(id, 61, 3, Feedback::manual("el-1", 1.0))
        .await
        .unwrap();

    assert_eq!(resolved.state, EscalationState::ResolvedByOtherTutors);
    let applied = fx.applier.applied.lock().unwrap();
    assert_eq!(applied.len(), 2);
    assert!(applied
        .iter()
        .all(|(_, feedback)| feedback.credits == Some(1.0)));
    assert_eq!(*fx.applier.submitted.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn disagreeing_decision_escalates_to_instructor() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;
    fx.coordinator.escalate(id, CAUSER).await.unwrap();

    fx.coordinator
        .submit_decision(id, 60, 2, Feedback::manual("el-1", 1.0))
        .await
        .unwrap();
    let escalated = fx
        .coordinator
        .submit_decision(id, 61, 3, Feedback::manual("el-1", 2.0))
        .await
        .unwrap();

    assert_eq!(escalated.state, EscalationState::EscalatedToInstructor);
    // No assessment was touched.
    assert!(fx.applier.applied.lock().unwrap().is_empty());

    eventually(|| !fx.notifications.instructor_calls.lock().unwrap().is_empty()).await;
    assert_eq!(
        *fx.notifications.instructor_calls.lock().unwrap(),
        vec![(id, 10)]
    );
}

#[tokio::test]
async fn decision_for_foreign_result_is_rejected() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;
    fx.coordinator.escalate(id, CAUSER).await.unwrap();

    // Result 99 is not part of the conflict.
    let err = fx
        .coordinator
        .submit_decision(id, 60, 99, Feedback::manual("el-1", 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ConflictError::MissingParticipant { result_id: 99, .. }));

    // Tutor 61 may not decide for tutor 60's result.
    let err = fx
        .coordinator
        .submit_decision(id, 61, 2, Feedback::manual("el-1", 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ConflictError::Unauthorized { user_id: 61, .. }));
}

#[tokio::test]
async fn instructor_decision_overwrites_every_feedback() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;
    fx.coordinator.escalate(id, CAUSER).await.unwrap();

    let resolved = fx
        .coordinator
        .instructor_decide(id, INSTRUCTOR, &Feedback::manual("el-1", 4.0))
        .await
        .unwrap();

    assert_eq!(resolved.state, EscalationState::ResolvedByInstructor);
    assert_eq!(resolved.causing.feedback.credits, Some(4.0));
    assert!(resolved
        .participants
        .iter()
        .all(|p| p.feedback.credits == Some(4.0)));

    let applied = fx.applier.applied.lock().unwrap();
    let mut result_ids: Vec<i64> = applied.iter().map(|(id, _)| *id).collect();
    result_ids.sort_unstable();
    assert_eq!(result_ids, vec![1, 2, 3]);
    assert!(applied
        .iter()
        .all(|(_, feedback)| feedback.credits == Some(4.0)));
}

#[tokio::test]
async fn non_instructor_cannot_decide() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;
    let err = fx
        .coordinator
        .instructor_decide(id, 60, &Feedback::manual("el-1", 4.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ConflictError::Unauthorized { user_id: 60, .. }));
}

#[tokio::test]
async fn removing_causing_result_deletes_its_conflicts() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;

    fx.coordinator.on_result_removed(1).await.unwrap();
    assert!(fx.store.find_by_id(id).await.is_none());
}

#[tokio::test]
async fn removing_participant_result_drops_only_that_participant() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;

    fx.coordinator.on_result_removed(2).await.unwrap();

    let stored = fx.store.find_by_id(id).await.unwrap();
    assert_eq!(stored.state, EscalationState::Unhandled);
    assert_eq!(stored.participants.len(), 1);
    assert_eq!(stored.participants[0].result_id, 3);
}

#[tokio::test]
async fn emptied_conflict_auto_resolves_and_resubmits() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;

    fx.coordinator.on_result_removed(2).await.unwrap();
    fx.coordinator.on_result_removed(3).await.unwrap();

    let stored = fx.store.find_by_id(id).await.unwrap();
    assert_eq!(stored.state, EscalationState::ResolvedByCauser);
    assert!(stored.resolution_date.is_some());
    assert_eq!(*fx.applier.submitted.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn queries_filter_by_exercise_submission_and_responsibility() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;

    assert_eq!(fx.coordinator.conflicts_for_exercise(10).await.len(), 1);
    assert!(fx.coordinator.conflicts_for_exercise(99).await.is_empty());
    assert_eq!(fx.coordinator.conflicts_for_submission(100).await.len(), 1);
    assert_eq!(fx.coordinator.unresolved_conflicts_for_result(1).await.len(), 1);

    // While unhandled, only the causing assessor (and instructors) see the
    // conflict as theirs to handle.
    assert_eq!(
        fx.coordinator
            .conflicts_for_current_user_for_submission(100, CAUSER)
            .await
            .len(),
        1
    );
    assert!(fx
        .coordinator
        .conflicts_for_current_user_for_submission(100, 60)
        .await
        .is_empty());

    fx.coordinator.escalate(id, CAUSER).await.unwrap();
    assert_eq!(
        fx.coordinator
            .conflicts_for_current_user_for_submission(100, 60)
            .await
            .len(),
        1
    );

    fx.coordinator
        .instructor_decide(id, INSTRUCTOR, &Feedback::manual("el-1", 1.0))
        .await
        .unwrap();
    assert!(fx.coordinator.unresolved_conflicts_for_result(1).await.is_empty());
}

/// The lost-update race: two tutors submit the final two decisions
/// concurrently. Both transactions load "not yet complete" aggregates, but
/// the compare-and-swap forces the loser to reload and re-evaluate, so the
/// conflict reaches exactly one terminal transition.
#[tokio::test]
async fn concurrent_final_decisions_produce_exactly_one_resolution() {
    let fx = fixture();
    let id = detected_conflict(&fx).await;
    fx.coordinator.escalate(id, CAUSER).await.unwrap();

    let first = fx
        .coordinator
        .submit_decision(id, 60, 2, Feedback::manual("el-1", 1.0));
    let second = fx
        .coordinator
        .submit_decision(id, 61, 3, Feedback::manual("el-1", 1.0));
    let (first, second) = futures::join!(first, second);
    first.unwrap();
    second.unwrap();

    let stored = fx.store.find_by_id(id).await.unwrap();
    assert_eq!(stored.state, EscalationState::ResolvedByOtherTutors);
    // Both decisions were applied exactly once each, and the causing
    // assessment was re-submitted exactly once.
    assert_eq!(fx.applier.applied.lock().unwrap().len(), 2);
    assert_eq!(*fx.applier.submitted.lock().unwrap(), vec![1]);
}
