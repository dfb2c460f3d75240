//! Shared error types for the services crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lesson_core::model::{LessonId, LessonRef};
use lesson_core::quiz::QuizError;
use lesson_core::sequencer::SequenceError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `LessonCatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("lesson {0} not found")]
    NotFound(LessonRef),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A locally rejected player action. Nothing was written and no state changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error("the current step is not a quiz")]
    NotAQuiz,
    #[error("the current step has no fretboard interactions")]
    NotInteractive,
}

/// Coarse classification of a `PlayerError`, carried by `SessionView::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    EntitlementRequired,
    StoreUnavailable,
    Validation,
}

/// Errors emitted by the lesson player.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlayerError {
    #[error("lesson {0} not found")]
    NotFound(LessonRef),
    #[error("lesson {lesson} requires a premium subscription")]
    EntitlementRequired { lesson: LessonId },
    #[error("progress store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl PlayerError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlayerError::NotFound(_) => ErrorKind::NotFound,
            PlayerError::EntitlementRequired { .. } => ErrorKind::EntitlementRequired,
            PlayerError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            PlayerError::Validation(_) => ErrorKind::Validation,
        }
    }

    /// True when the learner can stay on the page and try again.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlayerError::StoreUnavailable(_) | PlayerError::Validation(_)
        )
    }
}

impl From<CatalogError> for PlayerError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(lesson) => PlayerError::NotFound(lesson),
            CatalogError::Storage(e) => PlayerError::StoreUnavailable(e),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
