use lesson_core::model::{Lesson, LessonId, LessonMeta};
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{id_i64, map_lesson_meta_row, map_step_row, ser, to_json_list};
use crate::repository::{LessonFilter, LessonRepository, StorageError};

const LESSON_COLUMNS: &str = r"
    id, slug, title, description, lesson_number, duration_minutes,
    is_premium, is_published, tags, learning_objectives, created_at
";

fn write_error(e: sqlx::Error) -> StorageError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

impl SqliteRepository {
    async fn load_lesson(&self, row: Option<SqliteRow>) -> Result<Option<Lesson>, StorageError> {
        let meta = match row {
            Some(row) => map_lesson_meta_row(&row)?,
            None => return Ok(None),
        };

        let step_rows = sqlx::query(
            r"
            SELECT id, lesson_id, step_order, title, step_type, content
            FROM lesson_steps
            WHERE lesson_id = ?1
            ORDER BY step_order ASC, id ASC
            ",
        )
        .bind(id_i64("lesson_id", meta.id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut steps = Vec::with_capacity(step_rows.len());
        for row in step_rows {
            steps.push(map_step_row(&row)?);
        }

        Lesson::new(meta, steps).map(Some).map_err(ser)
    }
}

#[async_trait::async_trait]
impl LessonRepository for SqliteRepository {
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let meta = lesson.meta();
        let lesson_id = id_i64("lesson_id", meta.id.value())?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO lessons (
                id, slug, title, description, lesson_number, duration_minutes,
                is_premium, is_published, tags, learning_objectives, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                -- created_at stays as first inserted
                slug = excluded.slug,
                title = excluded.title,
                description = excluded.description,
                lesson_number = excluded.lesson_number,
                duration_minutes = excluded.duration_minutes,
                is_premium = excluded.is_premium,
                is_published = excluded.is_published,
                tags = excluded.tags,
                learning_objectives = excluded.learning_objectives
            ",
        )
        .bind(lesson_id)
        .bind(meta.slug.as_str())
        .bind(meta.title.as_str())
        .bind(meta.description.as_deref())
        .bind(i64::from(meta.lesson_number))
        .bind(meta.duration_minutes.map(i64::from))
        .bind(i64::from(meta.is_premium))
        .bind(i64::from(meta.is_published))
        .bind(to_json_list(&meta.tags)?)
        .bind(to_json_list(&meta.learning_objectives)?)
        .bind(meta.created_at)
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

        sqlx::query("DELETE FROM lesson_steps WHERE lesson_id = ?1")
            .bind(lesson_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for step in lesson.steps() {
            let content = serde_json::to_string(step.content()).map_err(ser)?;
            sqlx::query(
                r"
                INSERT INTO lesson_steps (id, lesson_id, step_order, title, step_type, content)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(id_i64("step_id", step.id().value())?)
            .bind(lesson_id)
            .bind(i64::from(step.step_order()))
            .bind(step.title())
            .bind(step.step_type().as_str())
            .bind(content)
            .execute(&mut *tx)
            .await
            .map_err(write_error)?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::debug!(
            lesson_id = %meta.id,
            steps = lesson.total_steps(),
            "lesson stored"
        );
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("lesson_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        self.load_lesson(row).await
    }

    async fn get_lesson_by_slug(&self, slug: &str) -> Result<Option<Lesson>, StorageError> {
        let sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE slug = ?1");
        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        self.load_lesson(row).await
    }

    async fn list_lessons(&self, filter: &LessonFilter) -> Result<Vec<LessonMeta>, StorageError> {
        // NULL parameters disable the corresponding filter; a negative limit means no limit.
        let sql = format!(
            r"
            SELECT {LESSON_COLUMNS}
            FROM lessons
            WHERE (?1 IS NULL OR is_published = ?1)
              AND (?2 IS NULL OR is_premium = ?2)
            ORDER BY lesson_number ASC, id ASC
            LIMIT ?3
            "
        );

        let rows = sqlx::query(&sql)
            .bind(filter.published.map(i64::from))
            .bind(filter.premium.map(i64::from))
            .bind(filter.limit.map_or(-1, i64::from))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut metas = Vec::with_capacity(rows.len());
        for row in rows {
            metas.push(map_lesson_meta_row(&row)?);
        }
        Ok(metas)
    }
}
