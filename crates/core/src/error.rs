use thiserror::Error;

use crate::model::{ContentError, LessonError, ProgressError};
use crate::quiz::QuizError;
use crate::sequencer::SequenceError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
}
