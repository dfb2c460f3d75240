use std::sync::Arc;

use lesson_core::model::{LessonId, PrincipalId, ProgressRecord, ProgressUpdate};
use storage::repository::{ProgressRepository, StorageError};

use crate::Clock;
use crate::error::PlayerError;

/// Reads, creates and updates the one progress record per (principal, lesson).
///
/// Every failure surfaces as `PlayerError::StoreUnavailable`.
#[derive(Clone)]
pub struct ProgressStore {
    clock: Clock,
    repo: Arc<dyn ProgressRepository>,
}

impl ProgressStore {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn ProgressRepository>) -> Self {
        Self { clock, repo }
    }

    /// # Errors
    ///
    /// Returns `PlayerError::StoreUnavailable` if the store cannot be read.
    pub async fn load(
        &self,
        principal: PrincipalId,
        lesson: LessonId,
    ) -> Result<Option<ProgressRecord>, PlayerError> {
        Ok(self.repo.get_progress(principal, lesson).await?)
    }

    /// Creates the first-visit record.
    ///
    /// If the backend reports that a row appeared in the meantime, that row is
    /// returned instead.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::StoreUnavailable` if the record cannot be written.
    pub async fn initialize(
        &self,
        principal: PrincipalId,
        lesson: LessonId,
    ) -> Result<ProgressRecord, PlayerError> {
        let record = ProgressRecord::started(principal, lesson, self.clock.now());
        match self.repo.insert_progress(&record).await {
            Ok(()) => {
                tracing::info!(%principal, lesson_id = %lesson, "progress initialized");
                Ok(record)
            }
            Err(StorageError::Conflict) => {
                tracing::debug!(%principal, lesson_id = %lesson, "progress already present");
                self.repo
                    .get_progress(principal, lesson)
                    .await?
                    .ok_or(PlayerError::StoreUnavailable(StorageError::NotFound))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Merges `update` into the stored record and returns the new state.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::StoreUnavailable` if the record is missing or
    /// cannot be written.
    pub async fn update(
        &self,
        principal: PrincipalId,
        lesson: LessonId,
        update: &ProgressUpdate,
    ) -> Result<ProgressRecord, PlayerError> {
        let record = self
            .repo
            .update_progress(principal, lesson, update, self.clock.now())
            .await?;
        tracing::debug!(
            %principal,
            lesson_id = %lesson,
            status = %record.status,
            percentage = record.progress_percentage,
            current_step = record.current_step,
            "progress updated"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::ProgressStatus;
    use lesson_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn store() -> ProgressStore {
        ProgressStore::new(fixed_clock(), Arc::new(InMemoryRepository::new()))
    }

    #[tokio::test]
    async fn initialize_creates_first_visit_record() {
        let store = store();
        let principal = PrincipalId::random();
        assert!(store.load(principal, LessonId::new(1)).await.unwrap().is_none());

        let record = store.initialize(principal, LessonId::new(1)).await.unwrap();
        assert_eq!(record.status, ProgressStatus::InProgress);
        assert_eq!(record.progress_percentage, 0);
        assert_eq!(record.current_step, 0);
        assert_eq!(record.time_spent_minutes, 0);
        assert_eq!(record.attempts_count, 1);
        assert_eq!(record.last_accessed_at, fixed_now());
    }

    #[tokio::test]
    async fn initialize_twice_returns_existing_row() {
        let store = store();
        let principal = PrincipalId::random();
        let first = store.initialize(principal, LessonId::new(1)).await.unwrap();
        store
            .update(
                principal,
                LessonId::new(1),
                &ProgressUpdate::new().with_current_step(2),
            )
            .await
            .unwrap();

        let second = store.initialize(principal, LessonId::new(1)).await.unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.current_step, 2);
    }

    #[tokio::test]
    async fn update_of_missing_record_is_store_unavailable() {
        let err = store()
            .update(
                PrincipalId::random(),
                LessonId::new(1),
                &ProgressUpdate::new().with_current_step(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlayerError::StoreUnavailable(StorageError::NotFound)
        ));
    }
}
