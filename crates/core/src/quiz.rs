//! Quiz scoring and the in-memory state of one pass through a quiz step.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::{Question, QuestionId, QuizContent};
use crate::sequencer::rounded_percentage;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("question {0} is not part of this quiz")]
    UnknownQuestion(QuestionId),

    #[error("question {question} is not the active question")]
    InactiveQuestion { question: QuestionId },

    #[error("option {option} is out of range for question {question} ({options} options)")]
    OptionOutOfRange {
        question: QuestionId,
        option: usize,
        options: usize,
    },

    #[error("question {0} has not been answered yet")]
    Unanswered(QuestionId),

    #[error("already at the first question")]
    AtFirstQuestion,

    #[error("this attempt is already finished")]
    AttemptFinished,

    #[error("retry is only offered after a failed attempt")]
    RetryUnavailable,
}

//
// ─── VERDICT ───────────────────────────────────────────────────────────────────
//

/// Review row for one question in a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: QuestionId,
    pub selected: Option<usize>,
    pub correct: usize,
    pub is_correct: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizVerdict {
    pub score: u8,
    pub passed: bool,
    pub breakdown: Vec<QuestionOutcome>,
}

impl QuizVerdict {
    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.breakdown.iter().filter(|o| o.is_correct).count()
    }
}

/// Percentage of `correct` out of `total`, rounded half up. An empty quiz scores 100.
#[must_use]
pub fn score_percentage(correct: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    rounded_percentage(correct, total)
}

/// Scores submitted answers against the quiz.
///
/// Unanswered questions count as wrong.
#[must_use]
pub fn evaluate(quiz: &QuizContent, answers: &BTreeMap<QuestionId, usize>) -> QuizVerdict {
    let breakdown: Vec<QuestionOutcome> = quiz
        .questions
        .iter()
        .map(|q| {
            let selected = answers.get(&q.id).copied();
            QuestionOutcome {
                question_id: q.id,
                selected,
                correct: q.correct,
                is_correct: selected == Some(q.correct),
                explanation: q.explanation.clone(),
            }
        })
        .collect();

    let correct = breakdown.iter().filter(|o| o.is_correct).count();
    let score = score_percentage(correct, quiz.questions.len());

    QuizVerdict {
        score,
        passed: score >= quiz.passing_score,
        breakdown,
    }
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// Where an attempt stands after moving forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizProgress {
    /// Now showing the question at this index.
    Question(usize),
    Finished(QuizVerdict),
}

/// Answers and question pointer for one pass through a quiz.
///
/// Questions are visited in list order. Going back keeps answers; only
/// `retry` clears them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuizAttempt {
    answers: BTreeMap<QuestionId, usize>,
    cursor: usize,
    verdict: Option<QuizVerdict>,
}

impl QuizAttempt {
    /// Starts an attempt. A quiz without questions is passed on the spot.
    #[must_use]
    pub fn new(quiz: &QuizContent) -> Self {
        let mut attempt = Self::default();
        if quiz.questions.is_empty() {
            attempt.verdict = Some(evaluate(quiz, &attempt.answers));
        }
        attempt
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<QuestionId, usize> {
        &self.answers
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn verdict(&self) -> Option<&QuizVerdict> {
        self.verdict.as_ref()
    }

    #[must_use]
    pub fn is_passed(&self) -> bool {
        self.verdict.as_ref().is_some_and(|v| v.passed)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.verdict.is_some()
    }

    #[must_use]
    pub fn active_question<'q>(&self, quiz: &'q QuizContent) -> Option<&'q Question> {
        if self.is_finished() {
            return None;
        }
        quiz.questions.get(self.cursor)
    }

    /// Records the selected option for the active question, replacing any earlier choice.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if the attempt is finished, the question is unknown
    /// or not active, or the option index is out of range.
    pub fn submit(
        &mut self,
        quiz: &QuizContent,
        question_id: QuestionId,
        option: usize,
    ) -> Result<(), QuizError> {
        if self.is_finished() {
            return Err(QuizError::AttemptFinished);
        }
        let question = quiz
            .question(question_id)
            .ok_or(QuizError::UnknownQuestion(question_id))?;
        if self.active_question(quiz).map(|q| q.id) != Some(question_id) {
            return Err(QuizError::InactiveQuestion {
                question: question_id,
            });
        }
        if option >= question.options.len() {
            return Err(QuizError::OptionOutOfRange {
                question: question_id,
                option,
                options: question.options.len(),
            });
        }
        self.answers.insert(question_id, option);
        Ok(())
    }

    /// Moves past the active question; on the last one, scores the attempt.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Unanswered` if the active question has no answer,
    /// or `QuizError::AttemptFinished` if already scored.
    pub fn next(&mut self, quiz: &QuizContent) -> Result<QuizProgress, QuizError> {
        let Some(question) = self.active_question(quiz) else {
            return Err(QuizError::AttemptFinished);
        };
        if !self.answers.contains_key(&question.id) {
            return Err(QuizError::Unanswered(question.id));
        }

        if self.cursor + 1 < quiz.questions.len() {
            self.cursor += 1;
            return Ok(QuizProgress::Question(self.cursor));
        }

        let verdict = evaluate(quiz, &self.answers);
        self.verdict = Some(verdict.clone());
        Ok(QuizProgress::Finished(verdict))
    }

    /// Steps back one question without touching submitted answers.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::AtFirstQuestion` at index 0, or
    /// `QuizError::AttemptFinished` once scored.
    pub fn previous(&mut self) -> Result<usize, QuizError> {
        if self.is_finished() {
            return Err(QuizError::AttemptFinished);
        }
        if self.cursor == 0 {
            return Err(QuizError::AtFirstQuestion);
        }
        self.cursor -= 1;
        Ok(self.cursor)
    }

    /// Clears answers and verdict and returns to the first question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::RetryUnavailable` unless the attempt finished with a fail.
    pub fn retry(&mut self) -> Result<(), QuizError> {
        match &self.verdict {
            Some(verdict) if !verdict.passed => {
                self.answers.clear();
                self.cursor = 0;
                self.verdict = None;
                Ok(())
            }
            _ => Err(QuizError::RetryUnavailable),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz(questions: u32, passing_score: u8) -> QuizContent {
        QuizContent {
            questions: (1..=questions)
                .map(|id| Question {
                    id: QuestionId::new(id),
                    prompt: format!("Which string is number {id}?"),
                    options: vec!["E".into(), "B".into(), "G".into(), "D".into()],
                    correct: 0,
                    explanation: format!("String {id} explanation"),
                })
                .collect(),
            passing_score,
        }
    }

    fn answers(correct: u32, total: u32) -> BTreeMap<QuestionId, usize> {
        (1..=total)
            .map(|id| (QuestionId::new(id), if id <= correct { 0 } else { 1 }))
            .collect()
    }

    #[test]
    fn three_of_five_passes_at_sixty() {
        let verdict = evaluate(&quiz(5, 60), &answers(3, 5));
        assert_eq!(verdict.score, 60);
        assert!(verdict.passed);
        assert_eq!(verdict.correct_count(), 3);
    }

    #[test]
    fn two_of_five_fails_at_sixty() {
        let verdict = evaluate(&quiz(5, 60), &answers(2, 5));
        assert_eq!(verdict.score, 40);
        assert!(!verdict.passed);
        assert_eq!(verdict.breakdown.len(), 5);
        assert!(!verdict.breakdown[4].is_correct);
        assert_eq!(verdict.breakdown[4].selected, Some(1));
    }

    #[test]
    fn empty_quiz_is_an_automatic_pass() {
        let verdict = evaluate(&quiz(0, 80), &BTreeMap::new());
        assert_eq!(verdict.score, 100);
        assert!(verdict.passed);

        let attempt = QuizAttempt::new(&quiz(0, 80));
        assert!(attempt.is_passed());
    }

    #[test]
    fn score_rounds_half_up() {
        assert_eq!(score_percentage(2, 3), 67);
        assert_eq!(score_percentage(1, 3), 33);
        assert_eq!(score_percentage(1, 8), 13);
        assert_eq!(score_percentage(0, 4), 0);
    }

    #[test]
    fn unanswered_questions_count_as_wrong() {
        let mut partial = BTreeMap::new();
        partial.insert(QuestionId::new(1), 0);
        let verdict = evaluate(&quiz(2, 50), &partial);
        assert_eq!(verdict.score, 50);
        assert_eq!(verdict.breakdown[1].selected, None);
    }

    #[test]
    fn attempt_walks_questions_in_order() {
        let quiz = quiz(2, 100);
        let mut attempt = QuizAttempt::new(&quiz);

        assert_eq!(
            attempt.next(&quiz).unwrap_err(),
            QuizError::Unanswered(QuestionId::new(1))
        );
        assert_eq!(
            attempt.submit(&quiz, QuestionId::new(2), 0).unwrap_err(),
            QuizError::InactiveQuestion {
                question: QuestionId::new(2)
            }
        );

        attempt.submit(&quiz, QuestionId::new(1), 0).unwrap();
        assert_eq!(attempt.next(&quiz).unwrap(), QuizProgress::Question(1));
        attempt.submit(&quiz, QuestionId::new(2), 0).unwrap();

        match attempt.next(&quiz).unwrap() {
            QuizProgress::Finished(verdict) => assert!(verdict.passed),
            other => panic!("expected verdict, got {other:?}"),
        }
        assert!(attempt.is_passed());
        assert_eq!(
            attempt.submit(&quiz, QuestionId::new(2), 1).unwrap_err(),
            QuizError::AttemptFinished
        );
    }

    #[test]
    fn going_back_keeps_answers() {
        let quiz = quiz(3, 60);
        let mut attempt = QuizAttempt::new(&quiz);
        attempt.submit(&quiz, QuestionId::new(1), 2).unwrap();
        attempt.next(&quiz).unwrap();

        assert_eq!(attempt.previous().unwrap(), 0);
        assert_eq!(attempt.answers().get(&QuestionId::new(1)), Some(&2));
        assert_eq!(attempt.previous().unwrap_err(), QuizError::AtFirstQuestion);
    }

    #[test]
    fn rejects_unknown_question_and_bad_option() {
        let quiz = quiz(1, 60);
        let mut attempt = QuizAttempt::new(&quiz);
        assert_eq!(
            attempt.submit(&quiz, QuestionId::new(9), 0).unwrap_err(),
            QuizError::UnknownQuestion(QuestionId::new(9))
        );
        assert!(matches!(
            attempt.submit(&quiz, QuestionId::new(1), 4).unwrap_err(),
            QuizError::OptionOutOfRange { option: 4, .. }
        ));
        assert!(attempt.answers().is_empty());
    }

    #[test]
    fn retry_clears_a_failed_attempt_only() {
        let quiz = quiz(1, 100);
        let mut attempt = QuizAttempt::new(&quiz);
        assert_eq!(attempt.retry().unwrap_err(), QuizError::RetryUnavailable);

        attempt.submit(&quiz, QuestionId::new(1), 3).unwrap();
        attempt.next(&quiz).unwrap();
        assert!(!attempt.is_passed());

        attempt.retry().unwrap();
        assert!(attempt.answers().is_empty());
        assert_eq!(attempt.cursor(), 0);
        assert!(attempt.verdict().is_none());

        attempt.submit(&quiz, QuestionId::new(1), 0).unwrap();
        attempt.next(&quiz).unwrap();
        assert!(attempt.is_passed());
        assert_eq!(attempt.retry().unwrap_err(), QuizError::RetryUnavailable);
    }
}
