//! Step pointer transitions, completion percentage and per-step gating.
//!
//! The pointer lives in `[0, total_steps)`. There is no "finished" position:
//! advancing from the last step yields `Transition::Complete` instead.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::{InteractiveContent, Step, StepContent};
use crate::quiz::QuizAttempt;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SequenceError {
    #[error("lesson has no steps")]
    EmptyLesson,

    #[error("step {index} is out of range (lesson has {total} steps)")]
    StepOutOfRange { index: usize, total: usize },

    #[error("{completed} of {required} required interactions done")]
    InteractionsPending { completed: usize, required: usize },

    #[error("quiz has not been finished")]
    QuizPending,

    #[error("quiz failed with score {score}; retry to continue")]
    QuizFailed { score: u8 },
}

/// `part / whole` as a percentage, rounded half up. Zero when `whole` is zero.
#[must_use]
pub fn rounded_percentage(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let part = part.min(whole);
    u8::try_from((200 * part + whole) / (2 * whole)).unwrap_or(100)
}

//
// ─── SEQUENCER ─────────────────────────────────────────────────────────────────
//

/// Outcome of an advance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    MoveTo { step: usize, percentage: u8 },
    /// The last step was finished; the pointer stays where it is.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSequencer {
    total_steps: usize,
}

impl StepSequencer {
    /// # Errors
    ///
    /// Returns `SequenceError::EmptyLesson` when `total_steps` is zero.
    pub fn new(total_steps: usize) -> Result<Self, SequenceError> {
        if total_steps == 0 {
            return Err(SequenceError::EmptyLesson);
        }
        Ok(Self { total_steps })
    }

    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    #[must_use]
    pub fn is_last(&self, step: usize) -> bool {
        step + 1 == self.total_steps
    }

    /// Percentage recorded when the learner stands on `step`.
    #[must_use]
    pub fn percentage_at(&self, step: usize) -> u8 {
        rounded_percentage(step + 1, self.total_steps)
    }

    /// # Errors
    ///
    /// Returns `SequenceError::StepOutOfRange` if `current` is not a valid index.
    pub fn advance_from(&self, current: usize) -> Result<Transition, SequenceError> {
        self.check(current)?;
        if self.is_last(current) {
            return Ok(Transition::Complete);
        }
        let step = current + 1;
        Ok(Transition::MoveTo {
            step,
            percentage: self.percentage_at(step),
        })
    }

    /// Review navigation to an arbitrary index.
    ///
    /// # Errors
    ///
    /// Returns `SequenceError::StepOutOfRange` if `target` is not a valid index.
    pub fn jump(&self, target: usize) -> Result<usize, SequenceError> {
        self.check(target)?;
        Ok(target)
    }

    /// Pulls a stored pointer back into range after the lesson got shorter.
    #[must_use]
    pub fn clamp(&self, stored: u32) -> usize {
        usize::try_from(stored)
            .unwrap_or(usize::MAX)
            .min(self.total_steps - 1)
    }

    fn check(&self, index: usize) -> Result<(), SequenceError> {
        if index >= self.total_steps {
            return Err(SequenceError::StepOutOfRange {
                index,
                total: self.total_steps,
            });
        }
        Ok(())
    }
}

//
// ─── STEP GATING ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionProgress {
    pub completed: usize,
    pub required: usize,
}

impl InteractionProgress {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed >= self.required
    }
}

/// Tracks which required fretboard targets the learner has triggered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InteractionTracker {
    required: BTreeSet<u8>,
    fired: BTreeSet<u8>,
}

impl InteractionTracker {
    #[must_use]
    pub fn new(content: &InteractiveContent) -> Self {
        Self {
            required: content
                .required_interactions
                .iter()
                .map(|i| i.target)
                .collect(),
            fired: BTreeSet::new(),
        }
    }

    /// Records a trigger. Returns true if it counted towards the requirement.
    pub fn trigger(&mut self, target: u8) -> bool {
        if !self.required.contains(&target) {
            return false;
        }
        self.fired.insert(target);
        true
    }

    #[must_use]
    pub fn progress(&self) -> InteractionProgress {
        InteractionProgress {
            completed: self.fired.len(),
            required: self.required.len(),
        }
    }
}

/// Local, unpersisted state of the active step that decides whether it may be left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepActivity {
    /// Intro, theory and practice steps: one acknowledgement is enough.
    Acknowledge,
    Interactive(InteractionTracker),
    Quiz(QuizAttempt),
}

impl StepActivity {
    #[must_use]
    pub fn for_step(step: &Step) -> Self {
        match step.content() {
            StepContent::Intro(_) | StepContent::Theory(_) | StepContent::Practice(_) => {
                StepActivity::Acknowledge
            }
            StepContent::Interactive(content) => {
                StepActivity::Interactive(InteractionTracker::new(content))
            }
            StepContent::Quiz(quiz) => StepActivity::Quiz(QuizAttempt::new(quiz)),
        }
    }

    /// Checks that the active step reports completion.
    ///
    /// # Errors
    ///
    /// Returns the reason advancing is blocked: pending interactions, an
    /// unfinished quiz, or a failed quiz.
    pub fn ensure_complete(&self) -> Result<(), SequenceError> {
        match self {
            StepActivity::Acknowledge => Ok(()),
            StepActivity::Interactive(tracker) => {
                let progress = tracker.progress();
                if progress.is_complete() {
                    Ok(())
                } else {
                    Err(SequenceError::InteractionsPending {
                        completed: progress.completed,
                        required: progress.required,
                    })
                }
            }
            StepActivity::Quiz(attempt) => match attempt.verdict() {
                None => Err(SequenceError::QuizPending),
                Some(verdict) if !verdict.passed => Err(SequenceError::QuizFailed {
                    score: verdict.score,
                }),
                Some(_) => Ok(()),
            },
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
