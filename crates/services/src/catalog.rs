use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use lesson_core::model::{
    Lesson, LessonMeta, LessonRef, PrincipalId, ProgressRecord, ProgressStatus,
};
use storage::repository::{LessonFilter, LessonRepository, ProgressRepository};

use crate::error::CatalogError;

/// Display label for a progress status.
#[must_use]
pub fn status_label(status: ProgressStatus) -> &'static str {
    status.label()
}

/// A published lesson paired with the learner's progress, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonOverview {
    pub meta: LessonMeta,
    pub progress: Option<ProgressRecord>,
}

impl LessonOverview {
    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.progress
            .as_ref()
            .map_or(ProgressStatus::NotStarted, |p| p.status)
    }

    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.progress.as_ref().map_or(0, |p| p.progress_percentage)
    }

    #[must_use]
    pub fn status_label(&self) -> &'static str {
        status_label(self.status())
    }
}

/// Read side of the lesson catalog as learners see it.
#[derive(Clone)]
pub struct LessonCatalogService {
    lessons: Arc<dyn LessonRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl LessonCatalogService {
    #[must_use]
    pub fn new(lessons: Arc<dyn LessonRepository>, progress: Arc<dyn ProgressRepository>) -> Self {
        Self { lessons, progress }
    }

    /// Fetch a playable lesson with its steps in order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the lesson is missing, unpublished
    /// or has no steps, and `CatalogError::Storage` on repository failures.
    pub async fn resolve(&self, lesson_ref: &LessonRef) -> Result<Lesson, CatalogError> {
        let found = match lesson_ref {
            LessonRef::Id(id) => self.lessons.get_lesson(*id).await?,
            LessonRef::Slug(slug) => self.lessons.get_lesson_by_slug(slug).await?,
        };

        let Some(lesson) = found.filter(Lesson::is_published) else {
            tracing::debug!(lesson = %lesson_ref, "lesson missing or unpublished");
            return Err(CatalogError::NotFound(lesson_ref.clone()));
        };

        if lesson.total_steps() == 0 {
            tracing::warn!(lesson_id = %lesson.id(), "published lesson has no steps");
            return Err(CatalogError::NotFound(lesson_ref.clone()));
        }

        Ok(lesson)
    }

    /// List lesson metadata ordered by lesson number.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` on repository failures.
    pub async fn list_lessons(
        &self,
        filter: &LessonFilter,
    ) -> Result<Vec<LessonMeta>, CatalogError> {
        Ok(self.lessons.list_lessons(filter).await?)
    }

    /// Published lessons, each with the principal's progress record when one exists.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` on repository failures.
    pub async fn list_with_progress(
        &self,
        principal: PrincipalId,
    ) -> Result<Vec<LessonOverview>, CatalogError> {
        let metas = self.lessons.list_lessons(&LessonFilter::published()).await?;
        let mut by_lesson: HashMap<_, _> = self
            .progress
            .list_progress(principal)
            .await?
            .into_iter()
            .map(|record| (record.lesson_id, record))
            .collect();

        Ok(metas
            .into_iter()
            .map(|meta| {
                let progress = by_lesson.remove(&meta.id);
                LessonOverview { meta, progress }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{LessonId, LessonMeta};
    use lesson_core::time::fixed_now;
    use storage::repository::Storage;
    use storage::sample;

    async fn seeded() -> (Storage, LessonCatalogService) {
        let storage = Storage::in_memory();
        storage
            .lessons
            .upsert_lesson(&sample::meet_the_strings(LessonId::new(1), fixed_now()).unwrap())
            .await
            .unwrap();
        storage
            .lessons
            .upsert_lesson(&sample::first_chords(LessonId::new(2), fixed_now()).unwrap())
            .await
            .unwrap();
        let catalog =
            LessonCatalogService::new(Arc::clone(&storage.lessons), Arc::clone(&storage.progress));
        (storage, catalog)
    }

    fn draft_meta(id: u64, slug: &str, is_published: bool) -> LessonMeta {
        LessonMeta {
            id: LessonId::new(id),
            slug: slug.into(),
            title: "Draft".into(),
            description: None,
            lesson_number: 9,
            duration_minutes: None,
            is_premium: false,
            is_published,
            tags: Vec::new(),
            learning_objectives: Vec::new(),
            created_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn resolves_by_id_and_slug() {
        let (_storage, catalog) = seeded().await;
        let by_id = catalog.resolve(&LessonRef::Id(LessonId::new(1))).await.unwrap();
        let by_slug = catalog
            .resolve(&LessonRef::Slug("meet-the-strings".into()))
            .await
            .unwrap();
        assert_eq!(by_id, by_slug);
        assert_eq!(by_id.total_steps(), 5);
    }

    #[tokio::test]
    async fn listing_applies_filter() {
        let (_storage, catalog) = seeded().await;
        let premium = catalog
            .list_lessons(&LessonFilter {
                premium: Some(true),
                ..LessonFilter::default()
            })
            .await
            .unwrap();
        let slugs: Vec<&str> = premium.iter().map(|m| m.slug.as_str()).collect();
        assert_eq!(slugs, vec!["first-chords"]);
    }

    #[tokio::test]
    async fn unpublished_and_empty_lessons_are_not_found() {
        let (storage, catalog) = seeded().await;
        let hidden = Lesson::new(draft_meta(3, "hidden", false), Vec::new()).unwrap();
        let empty = Lesson::new(draft_meta(4, "empty", true), Vec::new()).unwrap();
        storage.lessons.upsert_lesson(&hidden).await.unwrap();
        storage.lessons.upsert_lesson(&empty).await.unwrap();

        for raw in ["hidden", "empty", "missing"] {
            let err = catalog
                .resolve(&LessonRef::Slug(raw.into()))
                .await
                .unwrap_err();
            assert!(matches!(err, CatalogError::NotFound(_)), "{raw}");
        }
    }

    #[tokio::test]
    async fn overview_pairs_progress_with_lessons() {
        let (storage, catalog) = seeded().await;
        let principal = PrincipalId::random();
        storage
            .progress
            .insert_progress(&ProgressRecord::started(
                principal,
                LessonId::new(2),
                fixed_now(),
            ))
            .await
            .unwrap();

        let overview = catalog.list_with_progress(principal).await.unwrap();
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].status(), ProgressStatus::NotStarted);
        assert_eq!(overview[0].status_label(), "Not started");
        assert_eq!(overview[1].status(), ProgressStatus::InProgress);
        assert_eq!(overview[1].status_label(), "In progress");
        assert_eq!(overview[1].percentage(), 0);
    }
}
