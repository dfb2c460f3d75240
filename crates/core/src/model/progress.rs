use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::{LessonId, PrincipalId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("unknown progress status: {0}")]
    UnknownStatus(String),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    /// Kept for storage compatibility. Nothing in the engine moves a record here.
    Mastered,
}

impl ProgressStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
            ProgressStatus::Mastered => "mastered",
        }
    }

    /// Parses the storage representation.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownStatus` for unrecognized values.
    pub fn parse(raw: &str) -> Result<Self, ProgressError> {
        match raw {
            "not_started" => Ok(ProgressStatus::NotStarted),
            "in_progress" => Ok(ProgressStatus::InProgress),
            "completed" => Ok(ProgressStatus::Completed),
            "mastered" => Ok(ProgressStatus::Mastered),
            other => Err(ProgressError::UnknownStatus(other.to_owned())),
        }
    }

    /// Human label for listings.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "Not started",
            ProgressStatus::InProgress => "In progress",
            ProgressStatus::Completed => "Completed",
            ProgressStatus::Mastered => "Mastered",
        }
    }

    /// True once the lesson has been finished at least once.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, ProgressStatus::Completed | ProgressStatus::Mastered)
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── UPDATE ────────────────────────────────────────────────────────────────────
//

/// Partial-field update for a progress record. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub status: Option<ProgressStatus>,
    pub progress_percentage: Option<u8>,
    pub current_step: Option<u32>,
    pub time_spent_minutes: Option<u32>,
    pub best_score: Option<u8>,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_status(mut self, status: ProgressStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_percentage(mut self, percentage: u8) -> Self {
        self.progress_percentage = Some(percentage);
        self
    }

    #[must_use]
    pub fn with_current_step(mut self, step: u32) -> Self {
        self.current_step = Some(step);
        self
    }

    #[must_use]
    pub fn with_time_spent(mut self, minutes: u32) -> Self {
        self.time_spent_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn with_best_score(mut self, score: u8) -> Self {
        self.best_score = Some(score);
        self
    }

    /// True when no field would change (the update still refreshes access time).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

//
// ─── RECORD ────────────────────────────────────────────────────────────────────
//

/// Durable per-(principal, lesson) progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub principal_id: PrincipalId,
    pub lesson_id: LessonId,
    pub status: ProgressStatus,
    pub progress_percentage: u8,
    pub current_step: u32,
    pub time_spent_minutes: u32,
    pub attempts_count: u32,
    pub best_score: Option<u8>,
    pub last_accessed_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Fresh record for a first visit: in progress, step 0, one attempt.
    #[must_use]
    pub fn started(principal_id: PrincipalId, lesson_id: LessonId, now: DateTime<Utc>) -> Self {
        Self {
            principal_id,
            lesson_id,
            status: ProgressStatus::InProgress,
            progress_percentage: 0,
            current_step: 0,
            time_spent_minutes: 0,
            attempts_count: 1,
            best_score: None,
            last_accessed_at: now,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges `update` into the record.
    ///
    /// Access time is always refreshed. Setting `Completed` forces the
    /// percentage to 100 and stamps `completed_at`, whatever percentage the
    /// caller supplied.
    pub fn apply(&mut self, update: &ProgressUpdate, now: DateTime<Utc>) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(percentage) = update.progress_percentage {
            self.progress_percentage = percentage.min(100);
        }
        if let Some(step) = update.current_step {
            self.current_step = step;
        }
        if let Some(minutes) = update.time_spent_minutes {
            self.time_spent_minutes = minutes;
        }
        if let Some(score) = update.best_score {
            self.best_score = Some(score.min(100));
        }

        if update.status == Some(ProgressStatus::Completed) {
            self.progress_percentage = 100;
            self.completed_at = Some(now);
        }

        self.last_accessed_at = now;
        self.updated_at = now;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
