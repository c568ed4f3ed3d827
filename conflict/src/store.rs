//! Conflict aggregate storage.
//!
//! The unit of storage (and of locking) is the full conflict aggregate:
//! causing conflicting result plus all participants. Updates use optimistic
//! concurrency: a writer commits the version it loaded, and the store rejects
//! the commit when the aggregate has moved on since. Persistence mechanics
//! stay out of scope; a relational adapter would implement the same trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use domain::error::{ConflictError, ConflictResult};
use domain::models::conflict::AssessmentConflict;

#[async_trait]
pub trait ConflictStore: Send + Sync {
    /// Inserts a new conflict, assigning its id and initial version.
    async fn insert(&self, conflict: AssessmentConflict) -> AssessmentConflict;

    async fn find_by_id(&self, id: i64) -> Option<AssessmentConflict>;

    /// Conflicts whose causing conflicting result references the given result.
    async fn find_by_causing_result(&self, result_id: i64) -> Vec<AssessmentConflict>;

    /// Conflicts in which the given result appears as a participant.
    async fn find_by_participant_result(&self, result_id: i64) -> Vec<AssessmentConflict>;

    async fn find_by_exercise(&self, exercise_id: i64) -> Vec<AssessmentConflict>;

    /// Conflicts caused by assessments of the given submission.
    async fn find_by_submission(&self, submission_id: i64) -> Vec<AssessmentConflict>;

    /// Compare-and-swap commit: succeeds only when the stored version equals
    /// the version the caller loaded, and bumps the version on success.
    async fn try_update(&self, conflict: AssessmentConflict) -> ConflictResult<AssessmentConflict>;

    /// Removes the conflict. Returns whether it existed.
    async fn delete(&self, id: i64) -> bool;
}

/// In-memory aggregate store keyed by conflict id.
#[derive(Default)]
pub struct InMemoryConflictStore {
    conflicts: RwLock<HashMap<i64, AssessmentConflict>>,
    next_id: AtomicI64,
}

impl InMemoryConflictStore {
    pub fn new() -> Self {
        InMemoryConflictStore {
            conflicts: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl ConflictStore for InMemoryConflictStore {
    async fn insert(&self, mut conflict: AssessmentConflict) -> AssessmentConflict {
        conflict.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        conflict.version = 1;
        let mut conflicts = self.conflicts.write().await;
        conflicts.insert(conflict.id, conflict.clone());
        conflict
    }

    async fn find_by_id(&self, id: i64) -> Option<AssessmentConflict> {
        self.conflicts.read().await.get(&id).cloned()
    }

    async fn find_by_causing_result(&self, result_id: i64) -> Vec<AssessmentConflict> {
        self.conflicts
            .read()
            .await
            .values()
            .filter(|conflict| conflict.causing.result_id == result_id)
            .cloned()
            .collect()
    }

    async fn find_by_participant_result(&self, result_id: i64) -> Vec<AssessmentConflict> {
        self.conflicts
            .read()
            .await
            .values()
            .filter(|conflict| conflict.has_participant_for_result(result_id))
            .cloned()
            .collect()
    }

    async fn find_by_exercise(&self, exercise_id: i64) -> Vec<AssessmentConflict> {
        self.conflicts
            .read()
            .await
            .values()
            .filter(|conflict| conflict.exercise_id == exercise_id)
            .cloned()
            .collect()
    }

    async fn find_by_submission(&self, submission_id: i64) -> Vec<AssessmentConflict> {
        self.conflicts
            .read()
            .await
            .values()
            .filter(|conflict| conflict.causing_submission.id == submission_id)
            .cloned()
            .collect()
    }

    async fn try_update(&self, mut conflict: AssessmentConflict) -> ConflictResult<AssessmentConflict> {
        let mut conflicts = self.conflicts.write().await;
        let stored = conflicts
            .get(&conflict.id)
            .ok_or(ConflictError::NotFound(conflict.id))?;
        if stored.version != conflict.version {
            return Err(ConflictError::StaleConflict(conflict.id));
        }
        conflict.version += 1;
        conflicts.insert(conflict.id, conflict.clone());
        Ok(conflict)
    }

    async fn delete(&self, id: i64) -> bool {
        self.conflicts.write().await.remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::models::conflict::{ConflictingResult, EscalationState};
    use domain::models::exercise::ExerciseKind;
    use domain::models::feedback::Feedback;
    use domain::models::submission::SubmissionRef;

    fn unsaved_conflict() -> AssessmentConflict {
        AssessmentConflict {
            id: 0,
            exercise_id: 1,
            causing_submission: SubmissionRef::new(2, 3, 1, ExerciseKind::Modeling),
            causing: ConflictingResult::new("el-1", 10, 100, Feedback::manual("el-1", 1.0)),
            participants: vec![ConflictingResult::new(
                "el-2",
                11,
                101,
                Feedback::manual("el-2", 2.0),
            )],
            state: EscalationState::Unhandled,
            creation_date: Utc::now(),
            resolution_date: None,
            version: 0,
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_and_version() {
        let store = InMemoryConflictStore::new();
        let stored = store.insert(unsaved_conflict()).await;
        assert!(stored.id > 0);
        assert_eq!(stored.version, 1);
        assert!(store.find_by_id(stored.id).await.is_some());
    }

    #[tokio::test]
    async fn stale_update_is_rejected() {
        let store = InMemoryConflictStore::new();
        let stored = store.insert(unsaved_conflict()).await;

        let first = store.try_update(stored.clone()).await.unwrap();
        assert_eq!(first.version, 2);

        // Committing the previously loaded version again must fail.
        let err = store.try_update(stored).await.unwrap_err();
        assert!(matches!(err, ConflictError::StaleConflict(_)));
    }

    #[tokio::test]
    async fn lookups_cover_causing_and_participant_results() {
        let store = InMemoryConflictStore::new();
        let stored = store.insert(unsaved_conflict()).await;

        assert_eq!(store.find_by_causing_result(10).await.len(), 1);
        assert_eq!(store.find_by_participant_result(11).await.len(), 1);
        assert_eq!(store.find_by_participant_result(10).await.len(), 0);
        assert_eq!(store.find_by_exercise(1).await.len(), 1);
        assert_eq!(store.find_by_submission(2).await.len(), 1);

        assert!(store.delete(stored.id).await);
        assert!(!store.delete(stored.id).await);
    }
}
