use lesson_core::model::{
    LessonId, LessonMeta, PrincipalId, ProgressRecord, ProgressStatus, Step, StepContent, StepId,
    StepType,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u8_from_i64(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

pub(crate) fn principal_id_from_str(raw: &str) -> Result<PrincipalId, StorageError> {
    raw.parse::<PrincipalId>().map_err(ser)
}

fn json_list(row: &SqliteRow, column: &'static str) -> Result<Vec<String>, StorageError> {
    let raw: String = row.try_get(column).map_err(ser)?;
    serde_json::from_str(&raw).map_err(ser)
}

pub(crate) fn to_json_list(values: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(values).map_err(ser)
}

pub(crate) fn map_lesson_meta_row(row: &SqliteRow) -> Result<LessonMeta, StorageError> {
    Ok(LessonMeta {
        id: lesson_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        slug: row.try_get("slug").map_err(ser)?,
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        lesson_number: u32_from_i64(
            "lesson_number",
            row.try_get::<i64, _>("lesson_number").map_err(ser)?,
        )?,
        duration_minutes: row
            .try_get::<Option<i64>, _>("duration_minutes")
            .map_err(ser)?
            .map(|v| u32_from_i64("duration_minutes", v))
            .transpose()?,
        is_premium: row.try_get::<i64, _>("is_premium").map_err(ser)? != 0,
        is_published: row.try_get::<i64, _>("is_published").map_err(ser)? != 0,
        tags: json_list(row, "tags")?,
        learning_objectives: json_list(row, "learning_objectives")?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

/// Decodes a step row. The `step_type` column must agree with the tag inside `content`.
pub(crate) fn map_step_row(row: &SqliteRow) -> Result<Step, StorageError> {
    let step_type = StepType::parse(row.try_get::<String, _>("step_type").map_err(ser)?.as_str())
        .map_err(ser)?;
    let raw: String = row.try_get("content").map_err(ser)?;
    let content: StepContent = serde_json::from_str(&raw).map_err(ser)?;
    if content.step_type() != step_type {
        return Err(StorageError::Serialization(format!(
            "step_type column says {step_type} but content is {}",
            content.step_type()
        )));
    }

    Step::new(
        StepId::new(i64_to_u64("step_id", row.try_get::<i64, _>("id").map_err(ser)?)?),
        lesson_id_from_i64(row.try_get::<i64, _>("lesson_id").map_err(ser)?)?,
        u32_from_i64("step_order", row.try_get::<i64, _>("step_order").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        content,
    )
    .map_err(ser)
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    let status_str: String = row.try_get("status").map_err(ser)?;

    Ok(ProgressRecord {
        principal_id: principal_id_from_str(&row.try_get::<String, _>("user_id").map_err(ser)?)?,
        lesson_id: lesson_id_from_i64(row.try_get::<i64, _>("lesson_id").map_err(ser)?)?,
        status: ProgressStatus::parse(&status_str).map_err(ser)?,
        progress_percentage: u8_from_i64(
            "progress_percentage",
            row.try_get::<i64, _>("progress_percentage").map_err(ser)?,
        )?,
        current_step: u32_from_i64(
            "current_step",
            row.try_get::<i64, _>("current_step").map_err(ser)?,
        )?,
        time_spent_minutes: u32_from_i64(
            "time_spent_minutes",
            row.try_get::<i64, _>("time_spent_minutes").map_err(ser)?,
        )?,
        attempts_count: u32_from_i64(
            "attempts_count",
            row.try_get::<i64, _>("attempts_count").map_err(ser)?,
        )?,
        best_score: row
            .try_get::<Option<i64>, _>("best_score")
            .map_err(ser)?
            .map(|v| u8_from_i64("best_score", v))
            .transpose()?,
        last_accessed_at: row.try_get("last_accessed_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}
