use chrono::{DateTime, Duration, Utc};

use lesson_core::model::{
    Lesson, Principal, ProgressRecord, ProgressStatus, ProgressUpdate, QuestionId, QuizContent,
    Step, StepContent,
};
use lesson_core::quiz::{QuizAttempt, QuizProgress};
use lesson_core::sequencer::{
    InteractionProgress, SequenceError, StepActivity, StepSequencer, Transition,
};
use lesson_core::time::whole_minutes_between;

use crate::error::ValidationError;

/// What `previous` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviousOutcome {
    /// Moved back to this step index.
    Moved(usize),
    /// Already on the first step; the learner is leaving the lesson.
    Exit,
}

/// What a successful `advance` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Moved { step: usize, percentage: u8 },
    LessonComplete,
}

/// In-memory state of one learner working through one lesson.
///
/// Holds the last persisted progress record; it is only replaced with what
/// the store returned after a successful write.
#[derive(Debug, Clone)]
pub struct LessonSession {
    principal: Principal,
    lesson: Lesson,
    sequencer: StepSequencer,
    current_step: usize,
    activity: StepActivity,
    progress: ProgressRecord,
    timed_until: DateTime<Utc>,
    finished: bool,
}

impl LessonSession {
    pub(crate) fn new(
        principal: Principal,
        lesson: Lesson,
        sequencer: StepSequencer,
        current_step: usize,
        progress: ProgressRecord,
        opened_at: DateTime<Utc>,
    ) -> Result<Self, SequenceError> {
        let step = lesson.step(current_step).ok_or(SequenceError::StepOutOfRange {
            index: current_step,
            total: sequencer.total_steps(),
        })?;
        let activity = StepActivity::for_step(step);
        Ok(Self {
            principal,
            lesson,
            sequencer,
            current_step,
            activity,
            progress,
            timed_until: opened_at,
            finished: false,
        })
    }

    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    #[must_use]
    pub fn lesson(&self) -> &Lesson {
        &self.lesson
    }

    #[must_use]
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.sequencer.total_steps()
    }

    #[must_use]
    pub fn step(&self) -> &Step {
        // current_step is kept in range by the sequencer
        &self.lesson.steps()[self.current_step]
    }

    #[must_use]
    pub fn activity(&self) -> &StepActivity {
        &self.activity
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressRecord {
        &self.progress
    }

    /// True after the last step was completed in this session.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    //
    // ─── PERSISTED TRANSITIONS ─────────────────────────────────────────────────
    //

    /// Works out the transition and the minimal update that an advance needs.
    pub(crate) fn plan_advance(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(Transition, ProgressUpdate), ValidationError> {
        self.activity.ensure_complete()?;
        let transition = self.sequencer.advance_from(self.current_step)?;

        let mut update = ProgressUpdate::new();
        let elapsed = whole_minutes_between(self.timed_until, now);
        if elapsed > 0 {
            let total = self.progress.time_spent_minutes.saturating_add(elapsed);
            update = update.with_time_spent(total);
        }

        if let StepActivity::Quiz(attempt) = &self.activity {
            if let Some(verdict) = attempt.verdict().filter(|v| v.passed) {
                if self.progress.best_score.is_none_or(|best| verdict.score > best) {
                    update = update.with_best_score(verdict.score);
                }
            }
        }

        match transition {
            Transition::MoveTo { step, percentage } => {
                update = update.with_current_step(step_u32(step));
                if percentage > self.progress.progress_percentage {
                    update = update.with_percentage(percentage);
                }
            }
            Transition::Complete => {
                if !self.progress.status.is_finished() {
                    update = update.with_status(ProgressStatus::Completed);
                }
            }
        }

        Ok((transition, update))
    }

    pub(crate) fn commit_advance(
        &mut self,
        transition: Transition,
        record: ProgressRecord,
        now: DateTime<Utc>,
    ) -> AdvanceOutcome {
        let credited = whole_minutes_between(self.timed_until, now);
        self.timed_until += Duration::minutes(i64::from(credited));
        self.progress = record;

        match transition {
            Transition::MoveTo { step, percentage } => {
                self.enter_step(step);
                AdvanceOutcome::Moved { step, percentage }
            }
            Transition::Complete => {
                self.finished = true;
                AdvanceOutcome::LessonComplete
            }
        }
    }

    /// `None` when the target is the current step, which needs no write.
    pub(crate) fn plan_jump(
        &self,
        target: usize,
    ) -> Result<Option<ProgressUpdate>, ValidationError> {
        let step = self.sequencer.jump(target)?;
        if step == self.current_step {
            return Ok(None);
        }
        Ok(Some(ProgressUpdate::new().with_current_step(step_u32(step))))
    }

    /// Back onto the current step with its local activity intact.
    pub(crate) fn stay(&mut self) {
        self.finished = false;
    }

    pub(crate) fn commit_jump(&mut self, target: usize, record: ProgressRecord) {
        self.progress = record;
        self.finished = false;
        self.enter_step(target);
    }

    fn enter_step(&mut self, index: usize) {
        self.current_step = index;
        if let Some(step) = self.lesson.step(index) {
            self.activity = StepActivity::for_step(step);
        }
    }

    //
    // ─── LOCAL ACTIONS ─────────────────────────────────────────────────────────
    //

    pub(crate) fn trigger_interaction(
        &mut self,
        target: u8,
    ) -> Result<InteractionProgress, ValidationError> {
        match &mut self.activity {
            StepActivity::Interactive(tracker) => {
                tracker.trigger(target);
                Ok(tracker.progress())
            }
            _ => Err(ValidationError::NotInteractive),
        }
    }

    fn quiz_parts(&mut self) -> Result<(&QuizContent, &mut QuizAttempt), ValidationError> {
        let content = self
            .lesson
            .step(self.current_step)
            .map(Step::content);
        match (content, &mut self.activity) {
            (Some(StepContent::Quiz(quiz)), StepActivity::Quiz(attempt)) => Ok((quiz, attempt)),
            _ => Err(ValidationError::NotAQuiz),
        }
    }

    pub(crate) fn submit_quiz_answer(
        &mut self,
        question: QuestionId,
        option: usize,
    ) -> Result<(), ValidationError> {
        let (quiz, attempt) = self.quiz_parts()?;
        attempt.submit(quiz, question, option)?;
        Ok(())
    }

    pub(crate) fn next_question(&mut self) -> Result<QuizProgress, ValidationError> {
        let (quiz, attempt) = self.quiz_parts()?;
        Ok(attempt.next(quiz)?)
    }

    pub(crate) fn previous_question(&mut self) -> Result<usize, ValidationError> {
        let (_, attempt) = self.quiz_parts()?;
        Ok(attempt.previous()?)
    }

    pub(crate) fn retry_quiz(&mut self) -> Result<(), ValidationError> {
        let (_, attempt) = self.quiz_parts()?;
        attempt.retry()?;
        Ok(())
    }
}

fn step_u32(step: usize) -> u32 {
    u32::try_from(step).unwrap_or(u32::MAX)
}
