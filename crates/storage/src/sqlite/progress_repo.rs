use chrono::{DateTime, Utc};
use lesson_core::model::{LessonId, PrincipalId, ProgressRecord, ProgressUpdate};
use sqlx::{Sqlite, Transaction};

use super::SqliteRepository;
use super::mapping::{id_i64, map_progress_row};
use crate::repository::{ProgressRepository, StorageError};

const PROGRESS_COLUMNS: &str = r"
    user_id, lesson_id, status, progress_percentage, current_step, time_spent_minutes,
    attempts_count, best_score, last_accessed_at, completed_at, created_at, updated_at
";

async fn fetch_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    principal: PrincipalId,
    lesson: LessonId,
) -> Result<Option<ProgressRecord>, StorageError> {
    let sql = format!(
        "SELECT {PROGRESS_COLUMNS} FROM user_lesson_progress WHERE user_id = ?1 AND lesson_id = ?2"
    );
    let row = sqlx::query(&sql)
        .bind(principal.to_string())
        .bind(id_i64("lesson_id", lesson.value())?)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    row.as_ref().map(map_progress_row).transpose()
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        principal: PrincipalId,
        lesson: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let sql = format!(
            r"
            SELECT {PROGRESS_COLUMNS}
            FROM user_lesson_progress
            WHERE user_id = ?1 AND lesson_id = ?2
            "
        );
        let row = sqlx::query(&sql)
            .bind(principal.to_string())
            .bind(id_i64("lesson_id", lesson.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn insert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_lesson_progress (
                user_id, lesson_id, status, progress_percentage, current_step,
                time_spent_minutes, attempts_count, best_score, last_accessed_at,
                completed_at, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
        )
        .bind(record.principal_id.to_string())
        .bind(id_i64("lesson_id", record.lesson_id.value())?)
        .bind(record.status.as_str())
        .bind(i64::from(record.progress_percentage))
        .bind(i64::from(record.current_step))
        .bind(i64::from(record.time_spent_minutes))
        .bind(i64::from(record.attempts_count))
        .bind(record.best_score.map(i64::from))
        .bind(record.last_accessed_at)
        .bind(record.completed_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => StorageError::Conflict,
            _ => StorageError::Connection(e.to_string()),
        })?;

        Ok(())
    }

    async fn update_progress(
        &self,
        principal: PrincipalId,
        lesson: LessonId,
        update: &ProgressUpdate,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut record = fetch_in_tx(&mut tx, principal, lesson)
            .await?
            .ok_or(StorageError::NotFound)?;
        record.apply(update, now);

        sqlx::query(
            r"
            UPDATE user_lesson_progress SET
                status = ?3,
                progress_percentage = ?4,
                current_step = ?5,
                time_spent_minutes = ?6,
                best_score = ?7,
                last_accessed_at = ?8,
                completed_at = ?9,
                updated_at = ?10
            WHERE user_id = ?1 AND lesson_id = ?2
            ",
        )
        .bind(principal.to_string())
        .bind(id_i64("lesson_id", lesson.value())?)
        .bind(record.status.as_str())
        .bind(i64::from(record.progress_percentage))
        .bind(i64::from(record.current_step))
        .bind(i64::from(record.time_spent_minutes))
        .bind(record.best_score.map(i64::from))
        .bind(record.last_accessed_at)
        .bind(record.completed_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(record)
    }

    async fn list_progress(
        &self,
        principal: PrincipalId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let sql = format!(
            r"
            SELECT {PROGRESS_COLUMNS}
            FROM user_lesson_progress
            WHERE user_id = ?1
            ORDER BY lesson_id ASC
            "
        );
        let rows = sqlx::query(&sql)
            .bind(principal.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(map_progress_row(&row)?);
        }
        Ok(records)
    }
}
