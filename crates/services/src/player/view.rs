use serde::Serialize;

use lesson_core::model::{ProgressStatus, QuestionId, StepContent, StepId, StepType};
use lesson_core::quiz::QuestionOutcome;
use lesson_core::sequencer::{InteractionProgress, StepActivity};

use super::session::LessonSession;
use crate::error::{ErrorKind, PlayerError};

/// Progress numbers shown next to every step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub current_step: usize,
    pub total_steps: usize,
    pub percentage: u8,
    pub status: ProgressStatus,
    pub time_spent_minutes: u32,
    pub best_score: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub id: StepId,
    pub index: usize,
    pub title: String,
    pub step_type: StepType,
    pub content: StepContent,
}

/// A quiz question without its answer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    pub selected: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmittedAnswer {
    pub question_id: QuestionId,
    pub option: usize,
}

/// Everything a UI needs to render the player at one moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionView {
    Loading,
    Error {
        kind: ErrorKind,
        message: String,
        recoverable: bool,
    },
    Active {
        step: StepView,
        progress: ProgressSummary,
        interactions: Option<InteractionProgress>,
    },
    QuizActive {
        step: StepView,
        question: QuestionView,
        position: usize,
        total_questions: usize,
        answers: Vec<SubmittedAnswer>,
        progress: ProgressSummary,
    },
    QuizResult {
        step: StepView,
        score: u8,
        passed: bool,
        passing_score: u8,
        breakdown: Vec<QuestionOutcome>,
        progress: ProgressSummary,
    },
    LessonComplete {
        progress: ProgressSummary,
    },
}

impl SessionView {
    #[must_use]
    pub fn error(err: &PlayerError) -> Self {
        SessionView::Error {
            kind: err.kind(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }

    #[must_use]
    pub fn of(session: &LessonSession) -> Self {
        let record = session.progress();
        let progress = ProgressSummary {
            current_step: session.current_step(),
            total_steps: session.total_steps(),
            percentage: record.progress_percentage,
            status: record.status,
            time_spent_minutes: record.time_spent_minutes,
            best_score: record.best_score,
        };

        if session.is_finished() {
            return SessionView::LessonComplete { progress };
        }

        let current = session.step();
        let step = StepView {
            id: current.id(),
            index: session.current_step(),
            title: current.title().to_owned(),
            step_type: current.step_type(),
            content: current.content().clone(),
        };

        match (session.activity(), current.content()) {
            (StepActivity::Quiz(attempt), StepContent::Quiz(quiz)) => {
                if let Some(verdict) = attempt.verdict() {
                    return SessionView::QuizResult {
                        step,
                        score: verdict.score,
                        passed: verdict.passed,
                        passing_score: quiz.passing_score,
                        breakdown: verdict.breakdown.clone(),
                        progress,
                    };
                }
                let Some(question) = attempt.active_question(quiz) else {
                    return SessionView::Active {
                        step,
                        progress,
                        interactions: None,
                    };
                };
                SessionView::QuizActive {
                    question: QuestionView {
                        id: question.id,
                        prompt: question.prompt.clone(),
                        options: question.options.clone(),
                        selected: attempt.answers().get(&question.id).copied(),
                    },
                    position: attempt.cursor(),
                    total_questions: quiz.questions.len(),
                    answers: attempt
                        .answers()
                        .iter()
                        .map(|(question_id, option)| SubmittedAnswer {
                            question_id: *question_id,
                            option: *option,
                        })
                        .collect(),
                    step,
                    progress,
                }
            }
            (StepActivity::Interactive(tracker), _) => SessionView::Active {
                step,
                progress,
                interactions: Some(tracker.progress()),
            },
            _ => SessionView::Active {
                step,
                progress,
                interactions: None,
            },
        }
    }
}
