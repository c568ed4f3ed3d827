//! External collaborator seams.
//!
//! The conflict core never persists assessments, delivers notifications or
//! evaluates course roles itself; it calls out through these traits. The
//! surrounding platform provides the implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use domain::models::feedback::Feedback;

/// Failure reported by a collaborator call.
///
/// Notification failures are logged and dropped (best-effort delivery);
/// applier failures are logged after the transition has already committed.
#[derive(Debug, thiserror::Error)]
#[error("Collaborator call failed: {0}")]
pub struct CollaboratorError(pub String);

/// Pushes resolved decisions back into submitted manual assessments.
#[async_trait]
pub trait AssessmentApplier: Send + Sync {
    /// Applies a decided feedback to the given assessment result.
    async fn apply_decision(
        &self,
        result_id: i64,
        feedback: &Feedback,
    ) -> Result<(), CollaboratorError>;

    /// Re-submits the given manual assessment.
    async fn submit_assessment(
        &self,
        result_id: i64,
        exercise_id: i64,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Result<(), CollaboratorError>;
}

/// Delivers conflict notifications. Fire-and-forget: a failed delivery never
/// rolls back the transition that requested it.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Notifies the distinct assessors whose results are in conflict about a
    /// newly escalated conflict.
    async fn notify_participants_of_new_conflict(
        &self,
        assessor_ids: &[i64],
        exercise_id: i64,
        causing_assessor_id: i64,
    ) -> Result<(), CollaboratorError>;

    /// Notifies the instructor group about a conflict escalated to them.
    async fn notify_instructors_of_escalation(
        &self,
        conflict_id: i64,
        exercise_id: i64,
    ) -> Result<(), CollaboratorError>;
}

/// Answers course-role questions for authorization checks.
#[async_trait]
pub trait AuthorizationOracle: Send + Sync {
    async fn is_at_least_instructor(&self, exercise_id: i64, user_id: i64) -> bool;
}
