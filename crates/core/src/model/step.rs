use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::model::ids::{LessonId, QuestionId, StepId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContentError {
    #[error("quiz passing score must be between 0 and 100, got {0}")]
    InvalidPassingScore(u8),

    #[error("question {0} has no options")]
    QuestionWithoutOptions(QuestionId),

    #[error("question {question} marks option {correct} as correct but has {options} options")]
    CorrectOptionOutOfRange {
        question: QuestionId,
        correct: usize,
        options: usize,
    },

    #[error("question id {0} appears more than once in the quiz")]
    DuplicateQuestionId(QuestionId),

    #[error("unknown step type: {0}")]
    UnknownStepType(String),
}

//
// ─── STEP TYPE ─────────────────────────────────────────────────────────────────
//

/// Closed set of step kinds a lesson can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Intro,
    Theory,
    Interactive,
    Practice,
    Quiz,
}

impl StepType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StepType::Intro => "intro",
            StepType::Theory => "theory",
            StepType::Interactive => "interactive",
            StepType::Practice => "practice",
            StepType::Quiz => "quiz",
        }
    }

    /// Parses the storage representation of a step type.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::UnknownStepType` for anything outside the closed set.
    pub fn parse(raw: &str) -> Result<Self, ContentError> {
        match raw {
            "intro" => Ok(StepType::Intro),
            "theory" => Ok(StepType::Theory),
            "interactive" => Ok(StepType::Interactive),
            "practice" => Ok(StepType::Practice),
            "quiz" => Ok(StepType::Quiz),
            other => Err(ContentError::UnknownStepType(other.to_owned())),
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── CONTENT VARIANTS ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroContent {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFact {
    pub title: String,
    pub body: String,
}

/// Reference row describing one guitar string (number, local and English name, note).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringName {
    pub number: u8,
    pub name: String,
    pub name_english: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheoryContent {
    pub title: String,
    #[serde(default)]
    pub key_facts: Vec<KeyFact>,
    #[serde(default)]
    pub string_names: Vec<StringName>,
}

/// One thing the learner has to trigger on the fretboard before an
/// interactive step counts as done. `target` is the string index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredInteraction {
    pub target: u8,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractiveContent {
    pub title: String,
    pub instructions: String,
    #[serde(default)]
    pub required_interactions: Vec<RequiredInteraction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeContent {
    pub title: String,
    pub instructions: String,
    #[serde(default)]
    pub tips: Vec<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    /// Index into `options` of the right answer.
    pub correct: usize,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizContent {
    pub questions: Vec<Question>,
    /// Percentage (0-100) needed to pass.
    pub passing_score: u8,
}

impl QuizContent {
    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    fn validate(&self) -> Result<(), ContentError> {
        if self.passing_score > 100 {
            return Err(ContentError::InvalidPassingScore(self.passing_score));
        }
        let mut seen = HashSet::with_capacity(self.questions.len());
        for question in &self.questions {
            if !seen.insert(question.id) {
                return Err(ContentError::DuplicateQuestionId(question.id));
            }
            if question.options.is_empty() {
                return Err(ContentError::QuestionWithoutOptions(question.id));
            }
            if question.correct >= question.options.len() {
                return Err(ContentError::CorrectOptionOutOfRange {
                    question: question.id,
                    correct: question.correct,
                    options: question.options.len(),
                });
            }
        }
        Ok(())
    }
}

/// Step payload. The variant decides the step type; each carries only its own fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step_type", rename_all = "snake_case")]
pub enum StepContent {
    Intro(IntroContent),
    Theory(TheoryContent),
    Interactive(InteractiveContent),
    Practice(PracticeContent),
    Quiz(QuizContent),
}

impl StepContent {
    #[must_use]
    pub fn step_type(&self) -> StepType {
        match self {
            StepContent::Intro(_) => StepType::Intro,
            StepContent::Theory(_) => StepType::Theory,
            StepContent::Interactive(_) => StepType::Interactive,
            StepContent::Practice(_) => StepType::Practice,
            StepContent::Quiz(_) => StepType::Quiz,
        }
    }

    /// Checks variant-specific consistency rules.
    ///
    /// # Errors
    ///
    /// Returns `ContentError` when a quiz is malformed.
    pub fn validate(&self) -> Result<(), ContentError> {
        match self {
            StepContent::Quiz(quiz) => quiz.validate(),
            StepContent::Intro(_)
            | StepContent::Theory(_)
            | StepContent::Interactive(_)
            | StepContent::Practice(_) => Ok(()),
        }
    }
}

//
// ─── STEP ──────────────────────────────────────────────────────────────────────
//

/// One unit of lesson content at a fixed position inside its lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StepParts")]
pub struct Step {
    id: StepId,
    lesson_id: LessonId,
    step_order: u32,
    title: String,
    content: StepContent,
}

#[derive(Deserialize)]
struct StepParts {
    id: StepId,
    lesson_id: LessonId,
    step_order: u32,
    title: String,
    content: StepContent,
}

impl TryFrom<StepParts> for Step {
    type Error = ContentError;

    fn try_from(parts: StepParts) -> Result<Self, Self::Error> {
        Step::new(
            parts.id,
            parts.lesson_id,
            parts.step_order,
            parts.title,
            parts.content,
        )
    }
}

impl Step {
    /// Creates a validated step.
    ///
    /// # Errors
    ///
    /// Returns `ContentError` if the content fails validation.
    pub fn new(
        id: StepId,
        lesson_id: LessonId,
        step_order: u32,
        title: impl Into<String>,
        content: StepContent,
    ) -> Result<Self, ContentError> {
        content.validate()?;
        Ok(Self {
            id,
            lesson_id,
            step_order,
            title: title.into(),
            content,
        })
    }

    #[must_use]
    pub fn id(&self) -> StepId {
        self.id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn step_order(&self) -> u32 {
        self.step_order
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn content(&self) -> &StepContent {
        &self.content
    }

    #[must_use]
    pub fn step_type(&self) -> StepType {
        self.content.step_type()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
