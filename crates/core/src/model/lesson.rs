use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::{LessonId, StepId};
use crate::model::step::Step;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson slug cannot be empty")]
    EmptySlug,

    #[error("lesson slug may only contain lowercase letters, digits and dashes: {0}")]
    InvalidSlug(String),

    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("step {step} belongs to lesson {owner}, not {lesson}")]
    ForeignStep {
        step: StepId,
        owner: LessonId,
        lesson: LessonId,
    },

    #[error("two steps share step_order {0}")]
    DuplicateStepOrder(u32),
}

//
// ─── LESSON REFERENCE ──────────────────────────────────────────────────────────
//

/// How a caller names a lesson: by id or by its human-readable slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LessonRef {
    Id(LessonId),
    Slug(String),
}

impl LessonRef {
    /// Interprets a raw token: all digits is an id, anything else a slug.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<LessonId>() {
            Ok(id) => LessonRef::Id(id),
            Err(_) => LessonRef::Slug(trimmed.to_owned()),
        }
    }
}

impl fmt::Display for LessonRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LessonRef::Id(id) => write!(f, "#{id}"),
            LessonRef::Slug(slug) => f.write_str(slug),
        }
    }
}

impl From<LessonId> for LessonRef {
    fn from(id: LessonId) -> Self {
        LessonRef::Id(id)
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// Catalog metadata for a lesson, without steps.
///
/// Used for listings and as the input to `Lesson::new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonMeta {
    pub id: LessonId,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub lesson_number: u32,
    pub duration_minutes: Option<u32>,
    pub is_premium: bool,
    pub is_published: bool,
    pub tags: Vec<String>,
    pub learning_objectives: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl LessonMeta {
    fn validate(&self) -> Result<(), LessonError> {
        if self.slug.trim().is_empty() {
            return Err(LessonError::EmptySlug);
        }
        if !self
            .slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(LessonError::InvalidSlug(self.slug.clone()));
        }
        if self.title.trim().is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        Ok(())
    }
}

/// A lesson and its steps, sorted by `step_order`.
///
/// Orders are unique, so the sequence is total and stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LessonParts")]
pub struct Lesson {
    meta: LessonMeta,
    steps: Vec<Step>,
}

#[derive(Deserialize)]
struct LessonParts {
    meta: LessonMeta,
    steps: Vec<Step>,
}

impl TryFrom<LessonParts> for Lesson {
    type Error = LessonError;

    fn try_from(parts: LessonParts) -> Result<Self, Self::Error> {
        Lesson::new(parts.meta, parts.steps)
    }
}

impl Lesson {
    /// Builds a lesson, sorting steps ascending by `step_order`.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` if the metadata is invalid, a step belongs to
    /// another lesson, or two steps share an order.
    pub fn new(meta: LessonMeta, mut steps: Vec<Step>) -> Result<Self, LessonError> {
        meta.validate()?;

        if let Some(foreign) = steps.iter().find(|s| s.lesson_id() != meta.id) {
            return Err(LessonError::ForeignStep {
                step: foreign.id(),
                owner: foreign.lesson_id(),
                lesson: meta.id,
            });
        }

        steps.sort_by_key(Step::step_order);
        if let Some(pair) = steps
            .windows(2)
            .find(|pair| pair[0].step_order() == pair[1].step_order())
        {
            return Err(LessonError::DuplicateStepOrder(pair[0].step_order()));
        }

        Ok(Self { meta, steps })
    }

    #[must_use]
    pub fn meta(&self) -> &LessonMeta {
        &self.meta
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.meta.id
    }

    #[must_use]
    pub fn slug(&self) -> &str {
        &self.meta.slug
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.meta.title
    }

    #[must_use]
    pub fn is_premium(&self) -> bool {
        self.meta.is_premium
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        self.meta.is_published
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[must_use]
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
