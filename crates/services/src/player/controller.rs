use std::sync::Arc;

use lesson_core::EntitlementGate;
use lesson_core::model::{LessonRef, Principal, QuestionId};
use lesson_core::quiz::QuizProgress;
use lesson_core::sequencer::{InteractionProgress, StepSequencer};

use super::session::{AdvanceOutcome, LessonSession, PreviousOutcome};
use super::view::SessionView;
use crate::Clock;
use crate::catalog::LessonCatalogService;
use crate::error::{PlayerError, ValidationError};
use crate::progress::ProgressStore;

/// Drives a learner through a lesson: access check, progress load, step
/// navigation, quiz handling and one persisted update per transition.
#[derive(Clone)]
pub struct LessonPlayerService {
    clock: Clock,
    catalog: LessonCatalogService,
    progress: ProgressStore,
    gate: Arc<dyn EntitlementGate>,
}

fn rejected(session: &LessonSession, action: &'static str, err: ValidationError) -> PlayerError {
    tracing::warn!(
        lesson_id = %session.lesson().id(),
        step = session.current_step(),
        action,
        error = %err,
        "player action rejected"
    );
    PlayerError::Validation(err)
}

impl LessonPlayerService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: LessonCatalogService,
        progress: ProgressStore,
        gate: Arc<dyn EntitlementGate>,
    ) -> Self {
        Self {
            clock,
            catalog,
            progress,
            gate,
        }
    }

    /// Open a lesson for a principal, creating their progress record on first visit.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::NotFound` for missing, unpublished or empty lessons,
    /// `PlayerError::EntitlementRequired` when the principal may not access it
    /// (no progress is created), and `PlayerError::StoreUnavailable` on storage failures.
    pub async fn open(
        &self,
        lesson_ref: &LessonRef,
        principal: &Principal,
    ) -> Result<LessonSession, PlayerError> {
        let lesson = self.catalog.resolve(lesson_ref).await?;

        if !self.gate.can_access(&lesson, principal) {
            tracing::info!(
                principal = %principal.id,
                lesson_id = %lesson.id(),
                tier = %principal.subscription,
                "lesson requires a premium subscription"
            );
            return Err(PlayerError::EntitlementRequired { lesson: lesson.id() });
        }

        let sequencer = StepSequencer::new(lesson.total_steps())
            .map_err(|_| PlayerError::NotFound(lesson_ref.clone()))?;

        let record = match self.progress.load(principal.id, lesson.id()).await? {
            Some(record) => record,
            None => self.progress.initialize(principal.id, lesson.id()).await?,
        };

        let current_step = sequencer.clamp(record.current_step);
        if u32::try_from(current_step).ok() != Some(record.current_step) {
            tracing::warn!(
                lesson_id = %lesson.id(),
                stored = record.current_step,
                clamped = current_step,
                "stored step is past the end of the lesson"
            );
        }

        tracing::debug!(
            principal = %principal.id,
            lesson_id = %lesson.id(),
            step = current_step,
            status = %record.status,
            "lesson opened"
        );

        LessonSession::new(
            principal.clone(),
            lesson,
            sequencer,
            current_step,
            record,
            self.clock.now(),
        )
        .map_err(|_| PlayerError::NotFound(lesson_ref.clone()))
    }

    /// Finish the current step and move on, or complete the lesson on the last step.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Validation` while the step is not complete and
    /// `PlayerError::StoreUnavailable` if the update fails; the session is
    /// unchanged in both cases.
    pub async fn advance(
        &self,
        session: &mut LessonSession,
    ) -> Result<AdvanceOutcome, PlayerError> {
        let now = self.clock.now();
        let (transition, update) = session
            .plan_advance(now)
            .map_err(|e| rejected(session, "advance", e))?;

        let record = self
            .progress
            .update(session.principal().id, session.lesson().id(), &update)
            .await?;
        let outcome = session.commit_advance(transition, record, now);

        match outcome {
            AdvanceOutcome::Moved { step, percentage } => tracing::info!(
                lesson_id = %session.lesson().id(),
                step,
                percentage,
                "advanced"
            ),
            AdvanceOutcome::LessonComplete => tracing::info!(
                lesson_id = %session.lesson().id(),
                principal = %session.principal().id,
                "lesson completed"
            ),
        }
        Ok(outcome)
    }

    /// Go back one step. On the first step nothing is written and `Exit` is returned.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::StoreUnavailable` if the update fails.
    pub async fn previous(
        &self,
        session: &mut LessonSession,
    ) -> Result<PreviousOutcome, PlayerError> {
        if session.current_step() == 0 {
            return Ok(PreviousOutcome::Exit);
        }
        let target = session.current_step() - 1;
        self.jump_to(session, target).await?;
        Ok(PreviousOutcome::Moved(target))
    }

    /// Review navigation to any step. The recorded percentage is left alone and
    /// jumping to the current step keeps its local state without a write.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Validation` for an out-of-range index and
    /// `PlayerError::StoreUnavailable` if the update fails.
    pub async fn jump_to(
        &self,
        session: &mut LessonSession,
        index: usize,
    ) -> Result<(), PlayerError> {
        let Some(update) = session
            .plan_jump(index)
            .map_err(|e| rejected(session, "jump", e))?
        else {
            session.stay();
            tracing::debug!(lesson_id = %session.lesson().id(), step = index, "already on step");
            return Ok(());
        };

        let record = self
            .progress
            .update(session.principal().id, session.lesson().id(), &update)
            .await?;
        session.commit_jump(index, record);

        tracing::debug!(lesson_id = %session.lesson().id(), step = index, "jumped");
        Ok(())
    }

    /// Register a fretboard trigger on an interactive step.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Validation` if the current step is not interactive.
    pub fn trigger_interaction(
        &self,
        session: &mut LessonSession,
        target: u8,
    ) -> Result<InteractionProgress, PlayerError> {
        session
            .trigger_interaction(target)
            .map_err(|e| rejected(session, "trigger_interaction", e))
    }

    /// # Errors
    ///
    /// Returns `PlayerError::Validation` if the current step is not a quiz or
    /// the answer does not fit the active question.
    pub fn submit_quiz_answer(
        &self,
        session: &mut LessonSession,
        question: QuestionId,
        option: usize,
    ) -> Result<(), PlayerError> {
        session
            .submit_quiz_answer(question, option)
            .map_err(|e| rejected(session, "submit_quiz_answer", e))
    }

    /// # Errors
    ///
    /// Returns `PlayerError::Validation` if the active question is unanswered
    /// or the attempt is already scored.
    pub fn next_question(&self, session: &mut LessonSession) -> Result<QuizProgress, PlayerError> {
        let progress = session
            .next_question()
            .map_err(|e| rejected(session, "next_question", e))?;
        if let QuizProgress::Finished(verdict) = &progress {
            tracing::info!(
                lesson_id = %session.lesson().id(),
                score = verdict.score,
                passed = verdict.passed,
                "quiz scored"
            );
        }
        Ok(progress)
    }

    /// # Errors
    ///
    /// Returns `PlayerError::Validation` on the first question or once scored.
    pub fn previous_question(&self, session: &mut LessonSession) -> Result<usize, PlayerError> {
        session
            .previous_question()
            .map_err(|e| rejected(session, "previous_question", e))
    }

    /// # Errors
    ///
    /// Returns `PlayerError::Validation` unless the attempt ended in a fail.
    pub fn retry_quiz(&self, session: &mut LessonSession) -> Result<(), PlayerError> {
        session
            .retry_quiz()
            .map_err(|e| rejected(session, "retry_quiz", e))
    }

    #[must_use]
    pub fn view(&self, session: &LessonSession) -> SessionView {
        SessionView::of(session)
    }
}
