use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_core::model::{
    Lesson, LessonId, LessonMeta, PrincipalId, ProgressRecord, ProgressUpdate,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Catalog listing filter. `None` fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LessonFilter {
    pub published: Option<bool>,
    pub premium: Option<bool>,
    pub limit: Option<u32>,
}

impl LessonFilter {
    #[must_use]
    pub fn published() -> Self {
        Self {
            published: Some(true),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn matches(&self, meta: &LessonMeta) -> bool {
        self.published.is_none_or(|p| meta.is_published == p)
            && self.premium.is_none_or(|p| meta.is_premium == p)
    }
}

/// Read side of the lesson catalog, plus the write used by authoring and seeding.
#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// Persist a lesson and replace its steps.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lesson cannot be stored.
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;

    /// Fetch a lesson with its steps, published or not.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;

    /// Fetch a lesson with its steps by slug, published or not.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn get_lesson_by_slug(&self, slug: &str) -> Result<Option<Lesson>, StorageError>;

    /// List lesson metadata ordered by lesson number, then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_lessons(&self, filter: &LessonFilter) -> Result<Vec<LessonMeta>, StorageError>;
}

/// Row store for per-(principal, lesson) progress.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn get_progress(
        &self,
        principal: PrincipalId,
        lesson: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError>;

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the backend already holds a row
    /// for the pair, or other storage errors.
    async fn insert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError>;

    /// Merge `update` into the stored row and return the result.
    ///
    /// The merge follows `ProgressRecord::apply` and is atomic for the row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no row exists, or other storage errors.
    async fn update_progress(
        &self,
        principal: PrincipalId,
        lesson: LessonId,
        update: &ProgressUpdate,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError>;

    /// All records of a principal.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_progress(&self, principal: PrincipalId)
    -> Result<Vec<ProgressRecord>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    lessons: Arc<Mutex<HashMap<LessonId, Lesson>>>,
    progress: Arc<Mutex<HashMap<(PrincipalId, LessonId), ProgressRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl LessonRepository for InMemoryRepository {
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let mut guard = self.lessons.lock().map_err(poisoned)?;
        if guard
            .values()
            .any(|l| l.slug() == lesson.slug() && l.id() != lesson.id())
        {
            return Err(StorageError::Conflict);
        }
        guard.insert(lesson.id(), lesson.clone());
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let guard = self.lessons.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn get_lesson_by_slug(&self, slug: &str) -> Result<Option<Lesson>, StorageError> {
        let guard = self.lessons.lock().map_err(poisoned)?;
        Ok(guard.values().find(|l| l.slug() == slug).cloned())
    }

    async fn list_lessons(&self, filter: &LessonFilter) -> Result<Vec<LessonMeta>, StorageError> {
        let guard = self.lessons.lock().map_err(poisoned)?;
        let mut metas: Vec<LessonMeta> = guard
            .values()
            .map(|l| l.meta().clone())
            .filter(|m| filter.matches(m))
            .collect();
        metas.sort_by_key(|m| (m.lesson_number, m.id));
        if let Some(limit) = filter.limit {
            metas.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(metas)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        principal: PrincipalId,
        lesson: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard.get(&(principal, lesson)).cloned())
    }

    async fn insert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        let key = (record.principal_id, record.lesson_id);
        if guard.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        guard.insert(key, record.clone());
        Ok(())
    }

    async fn update_progress(
        &self,
        principal: PrincipalId,
        lesson: LessonId,
        update: &ProgressUpdate,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        let record = guard
            .get_mut(&(principal, lesson))
            .ok_or(StorageError::NotFound)?;
        record.apply(update, now);
        Ok(record.clone())
    }

    async fn list_progress(
        &self,
        principal: PrincipalId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        let mut records: Vec<ProgressRecord> = guard
            .values()
            .filter(|r| r.principal_id == principal)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.lesson_id);
        Ok(records)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub lessons: Arc<dyn LessonRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let lessons: Arc<dyn LessonRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self { lessons, progress }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample;
    use chrono::Duration;
    use lesson_core::model::ProgressStatus;
    use lesson_core::time::fixed_now;

    #[tokio::test]
    async fn lessons_list_in_number_order_with_filters() {
        let repo = InMemoryRepository::new();
        let strings = sample::meet_the_strings(LessonId::new(1), fixed_now()).unwrap();
        let chords = sample::first_chords(LessonId::new(2), fixed_now()).unwrap();
        repo.upsert_lesson(&chords).await.unwrap();
        repo.upsert_lesson(&strings).await.unwrap();

        let all = repo.list_lessons(&LessonFilter::default()).await.unwrap();
        let ids: Vec<_> = all.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![LessonId::new(1), LessonId::new(2)]);

        let premium = repo
            .list_lessons(&LessonFilter {
                premium: Some(true),
                ..LessonFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(premium.len(), 1);
        assert!(premium[0].is_premium);

        let limited = repo
            .list_lessons(&LessonFilter {
                limit: Some(1),
                ..LessonFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn slug_lookup_finds_lesson() {
        let repo = InMemoryRepository::new();
        let strings = sample::meet_the_strings(LessonId::new(1), fixed_now()).unwrap();
        repo.upsert_lesson(&strings).await.unwrap();

        let found = repo
            .get_lesson_by_slug("meet-the-strings")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id(), LessonId::new(1));
        assert!(repo.get_lesson_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn progress_insert_then_update_merges() {
        let repo = InMemoryRepository::new();
        let principal = PrincipalId::random();
        let record = ProgressRecord::started(principal, LessonId::new(1), fixed_now());
        repo.insert_progress(&record).await.unwrap();
        assert!(matches!(
            repo.insert_progress(&record).await.unwrap_err(),
            StorageError::Conflict
        ));

        let later = fixed_now() + Duration::minutes(2);
        let updated = repo
            .update_progress(
                principal,
                LessonId::new(1),
                &ProgressUpdate::new()
                    .with_status(ProgressStatus::Completed)
                    .with_percentage(10),
                later,
            )
            .await
            .unwrap();
        assert_eq!(updated.progress_percentage, 100);
        assert_eq!(updated.completed_at, Some(later));

        let stored = repo
            .get_progress(principal, LessonId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn update_without_row_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo
            .update_progress(
                PrincipalId::random(),
                LessonId::new(1),
                &ProgressUpdate::new().with_current_step(1),
                fixed_now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }
}
