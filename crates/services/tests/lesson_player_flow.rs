use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use lesson_core::SubscriptionGate;
use lesson_core::model::{
    LessonId, LessonRef, Principal, PrincipalId, ProgressRecord, ProgressStatus, ProgressUpdate,
    QuestionId, SubscriptionTier,
};
use lesson_core::quiz::{QuizError, QuizProgress};
use lesson_core::sequencer::{SequenceError, StepActivity};
use lesson_core::time::fixed_now;
use services::{
    AdvanceOutcome, AppServices, Clock, LessonPlayerService, LessonSession, PlayerError,
    PreviousOutcome, SessionView, ValidationError,
};
use storage::repository::{
    InMemoryRepository, LessonRepository, ProgressRepository, Storage, StorageError,
};
use storage::sample;

//
// ─── TEST DOUBLES ──────────────────────────────────────────────────────────────
//

/// Progress repository that counts calls and can be told to fail writes.
#[derive(Default)]
struct CountingProgress {
    inner: InMemoryRepository,
    gets: AtomicUsize,
    inserts: AtomicUsize,
    updates: AtomicUsize,
    fail_updates: AtomicBool,
    last_update: Mutex<Option<ProgressUpdate>>,
}

impl CountingProgress {
    fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    fn set_failing(&self, failing: bool) {
        self.fail_updates.store(failing, Ordering::SeqCst);
    }

    fn last_update(&self) -> Option<ProgressUpdate> {
        self.last_update.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ProgressRepository for CountingProgress {
    async fn get_progress(
        &self,
        principal: PrincipalId,
        lesson: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get_progress(principal, lesson).await
    }

    async fn insert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_progress(record).await
    }

    async fn update_progress(
        &self,
        principal: PrincipalId,
        lesson: LessonId,
        update: &ProgressUpdate,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("store offline".into()));
        }
        self.updates.fetch_add(1, Ordering::SeqCst);
        *self.last_update.lock().unwrap() = Some(update.clone());
        self.inner
            .update_progress(principal, lesson, update, now)
            .await
    }

    async fn list_progress(
        &self,
        principal: PrincipalId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        self.inner.list_progress(principal).await
    }
}

//
// ─── HARNESS ───────────────────────────────────────────────────────────────────
//

struct Harness {
    storage: Storage,
    progress: Arc<CountingProgress>,
}

impl Harness {
    async fn new() -> Self {
        let lessons = InMemoryRepository::new();
        lessons
            .upsert_lesson(&sample::meet_the_strings(LessonId::new(1), fixed_now()).unwrap())
            .await
            .unwrap();
        lessons
            .upsert_lesson(&sample::first_chords(LessonId::new(2), fixed_now()).unwrap())
            .await
            .unwrap();

        let progress = Arc::new(CountingProgress::default());
        let storage = Storage {
            lessons: Arc::new(lessons),
            progress: Arc::clone(&progress) as Arc<dyn ProgressRepository>,
        };
        Self { storage, progress }
    }

    fn player_at(&self, at: DateTime<Utc>) -> Arc<LessonPlayerService> {
        AppServices::from_storage(&self.storage, Clock::fixed(at), Arc::new(SubscriptionGate))
            .player()
    }

    fn player(&self) -> Arc<LessonPlayerService> {
        self.player_at(fixed_now())
    }
}

fn learner(tier: SubscriptionTier) -> Principal {
    Principal::new(PrincipalId::random(), tier)
}

fn strings() -> LessonRef {
    LessonRef::Slug("meet-the-strings".into())
}

/// Walks a fresh session of "Meet the Strings" up to its quiz step.
async fn to_quiz(player: &LessonPlayerService, session: &mut LessonSession) {
    player.advance(session).await.unwrap();
    player.advance(session).await.unwrap();
    for target in [0, 5, 2] {
        player.trigger_interaction(session, target).unwrap();
    }
    player.advance(session).await.unwrap();
    player.advance(session).await.unwrap();
    assert_eq!(session.current_step(), 4);
}

fn answer_all(player: &LessonPlayerService, session: &mut LessonSession, options: [usize; 5]) {
    for (i, option) in options.into_iter().enumerate() {
        let question = QuestionId::new(u32::try_from(i + 1).unwrap());
        player
            .submit_quiz_answer(session, question, option)
            .unwrap();
        player.next_question(session).unwrap();
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn full_walkthrough_completes_the_lesson() {
    let h = Harness::new().await;
    let player = h.player();
    let principal = learner(SubscriptionTier::Free);

    let mut session = player.open(&strings(), &principal).await.unwrap();
    assert_eq!(session.current_step(), 0);
    assert_eq!(session.progress().status, ProgressStatus::InProgress);
    assert_eq!(h.progress.inserts(), 1);
    assert_eq!(h.progress.updates(), 0);

    assert_eq!(
        player.advance(&mut session).await.unwrap(),
        AdvanceOutcome::Moved {
            step: 1,
            percentage: 40
        }
    );
    player.advance(&mut session).await.unwrap();
    assert_eq!(session.progress().progress_percentage, 60);

    // interactive step: all three targets are needed
    let err = player.advance(&mut session).await.unwrap_err();
    assert!(matches!(
        err,
        PlayerError::Validation(ValidationError::Sequence(SequenceError::InteractionsPending {
            completed: 0,
            required: 3
        }))
    ));
    player.trigger_interaction(&mut session, 0).unwrap();
    player.trigger_interaction(&mut session, 5).unwrap();
    let partial = player.trigger_interaction(&mut session, 4).unwrap();
    assert_eq!((partial.completed, partial.required), (2, 3));
    assert!(player.advance(&mut session).await.is_err());
    player.trigger_interaction(&mut session, 2).unwrap();
    player.advance(&mut session).await.unwrap();
    player.advance(&mut session).await.unwrap();
    assert_eq!(session.current_step(), 4);
    assert_eq!(session.progress().progress_percentage, 100);
    assert_eq!(h.progress.updates(), 4);

    // quiz: 2 of 5 correct fails at 40, retry, then 3 of 5 passes at 60
    assert!(matches!(
        player.view(&session),
        SessionView::QuizActive { position: 0, .. }
    ));
    answer_all(&player, &mut session, [1, 2, 0, 1, 1]);
    match player.view(&session) {
        SessionView::QuizResult { score, passed, .. } => {
            assert_eq!(score, 40);
            assert!(!passed);
        }
        other => panic!("expected quiz result, got {other:?}"),
    }
    assert!(matches!(
        player.advance(&mut session).await.unwrap_err(),
        PlayerError::Validation(ValidationError::Sequence(SequenceError::QuizFailed { score: 40 }))
    ));
    player.retry_quiz(&mut session).unwrap();
    answer_all(&player, &mut session, [1, 2, 2, 1, 1]);
    assert!(matches!(
        player.view(&session),
        SessionView::QuizResult {
            score: 60,
            passed: true,
            ..
        }
    ));
    assert_eq!(h.progress.updates(), 4);

    assert_eq!(
        player.advance(&mut session).await.unwrap(),
        AdvanceOutcome::LessonComplete
    );
    let record = session.progress();
    assert_eq!(record.status, ProgressStatus::Completed);
    assert_eq!(record.progress_percentage, 100);
    assert_eq!(record.completed_at, Some(fixed_now()));
    assert_eq!(record.best_score, Some(60));
    assert_eq!(record.attempts_count, 1);
    assert_eq!(h.progress.updates(), 5);
    assert!(matches!(
        player.view(&session),
        SessionView::LessonComplete { .. }
    ));
}

#[tokio::test]
async fn premium_lesson_is_gated_before_any_progress_access() {
    let h = Harness::new().await;
    let player = h.player();

    let err = player
        .open(
            &LessonRef::Slug("first-chords".into()),
            &learner(SubscriptionTier::Free),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PlayerError::EntitlementRequired { lesson } if lesson == LessonId::new(2)
    ));
    assert_eq!(h.progress.gets(), 0);
    assert_eq!(h.progress.inserts(), 0);

    let session = player
        .open(
            &LessonRef::Id(LessonId::new(2)),
            &learner(SubscriptionTier::Premium),
        )
        .await
        .unwrap();
    assert_eq!(session.total_steps(), 3);
}

#[tokio::test]
async fn unknown_lesson_is_not_found() {
    let h = Harness::new().await;
    let err = h
        .player()
        .open(
            &LessonRef::Slug("no-such-lesson".into()),
            &learner(SubscriptionTier::Premium),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PlayerError::NotFound(_)));
    assert!(!err.is_recoverable());
    assert_eq!(h.progress.gets(), 0);
}

#[tokio::test]
async fn reopening_reuses_the_progress_record() {
    let h = Harness::new().await;
    let player = h.player();
    let principal = learner(SubscriptionTier::Free);

    let mut first = player.open(&strings(), &principal).await.unwrap();
    player.advance(&mut first).await.unwrap();

    let second = player.open(&strings(), &principal).await.unwrap();
    assert_eq!(h.progress.inserts(), 1);
    assert_eq!(second.current_step(), 1);
    assert_eq!(second.progress().progress_percentage, 40);
}

#[tokio::test]
async fn failed_write_leaves_session_untouched() {
    let h = Harness::new().await;
    let player = h.player();
    let mut session = player
        .open(&strings(), &learner(SubscriptionTier::Free))
        .await
        .unwrap();
    let before = session.progress().clone();

    h.progress.set_failing(true);
    let err = player.advance(&mut session).await.unwrap_err();
    assert!(matches!(err, PlayerError::StoreUnavailable(_)));
    assert!(err.is_recoverable());
    assert_eq!(session.current_step(), 0);
    assert_eq!(session.progress(), &before);

    let err = player.jump_to(&mut session, 3).await.unwrap_err();
    assert!(matches!(err, PlayerError::StoreUnavailable(_)));
    assert_eq!(session.current_step(), 0);

    h.progress.set_failing(false);
    player.advance(&mut session).await.unwrap();
    assert_eq!(session.current_step(), 1);
}

#[tokio::test]
async fn review_after_jump_never_lowers_percentage() {
    let h = Harness::new().await;
    let player = h.player();
    let mut session = player
        .open(&strings(), &learner(SubscriptionTier::Free))
        .await
        .unwrap();
    player.advance(&mut session).await.unwrap();
    player.advance(&mut session).await.unwrap();
    assert_eq!(session.progress().progress_percentage, 60);

    player.jump_to(&mut session, 0).await.unwrap();
    assert_eq!(session.current_step(), 0);
    assert_eq!(session.progress().progress_percentage, 60);
    assert_eq!(
        h.progress.last_update(),
        Some(ProgressUpdate::new().with_current_step(0))
    );

    player.advance(&mut session).await.unwrap();
    assert_eq!(session.current_step(), 1);
    assert_eq!(session.progress().progress_percentage, 60);
    assert_eq!(
        h.progress.last_update(),
        Some(ProgressUpdate::new().with_current_step(1))
    );
}

#[tokio::test]
async fn previous_on_first_step_exits_without_writing() {
    let h = Harness::new().await;
    let player = h.player();
    let mut session = player
        .open(&strings(), &learner(SubscriptionTier::Free))
        .await
        .unwrap();

    assert_eq!(
        player.previous(&mut session).await.unwrap(),
        PreviousOutcome::Exit
    );
    assert_eq!(h.progress.updates(), 0);

    player.advance(&mut session).await.unwrap();
    assert_eq!(
        player.previous(&mut session).await.unwrap(),
        PreviousOutcome::Moved(0)
    );
    assert_eq!(session.current_step(), 0);
}

#[tokio::test]
async fn stale_step_is_clamped_on_open() {
    let h = Harness::new().await;
    let principal = learner(SubscriptionTier::Free);
    let mut stale = ProgressRecord::started(principal.id, LessonId::new(1), fixed_now());
    stale.current_step = 99;
    h.progress.insert_progress(&stale).await.unwrap();

    let session = h.player().open(&strings(), &principal).await.unwrap();
    assert_eq!(session.current_step(), 4);
    assert_eq!(h.progress.updates(), 0);
}

#[tokio::test]
async fn recompleting_does_not_resend_status() {
    let h = Harness::new().await;
    let principal = learner(SubscriptionTier::Free);
    let mut done = ProgressRecord::started(principal.id, LessonId::new(1), fixed_now());
    done.status = ProgressStatus::Completed;
    done.progress_percentage = 100;
    done.current_step = 4;
    done.best_score = Some(100);
    done.completed_at = Some(fixed_now());
    h.progress.insert_progress(&done).await.unwrap();

    let player = h.player();
    let mut session = player.open(&strings(), &principal).await.unwrap();
    answer_all(&player, &mut session, [1, 2, 2, 0, 0]);
    assert_eq!(
        player.advance(&mut session).await.unwrap(),
        AdvanceOutcome::LessonComplete
    );

    let sent = h.progress.last_update().unwrap();
    assert!(sent.is_empty());
    assert_eq!(session.progress().status, ProgressStatus::Completed);
    assert_eq!(session.progress().best_score, Some(100));
}

#[tokio::test]
async fn better_passing_score_is_recorded_as_best() {
    let h = Harness::new().await;
    let principal = learner(SubscriptionTier::Free);
    let mut done = ProgressRecord::started(principal.id, LessonId::new(1), fixed_now());
    done.current_step = 4;
    done.best_score = Some(60);
    h.progress.insert_progress(&done).await.unwrap();

    let player = h.player();
    let mut session = player.open(&strings(), &principal).await.unwrap();
    answer_all(&player, &mut session, [1, 2, 2, 0, 0]);
    player.advance(&mut session).await.unwrap();

    let sent = h.progress.last_update().unwrap();
    assert_eq!(sent.best_score, Some(100));
    assert_eq!(sent.status, Some(ProgressStatus::Completed));
    assert_eq!(session.progress().best_score, Some(100));
}

#[tokio::test]
async fn elapsed_whole_minutes_accumulate_on_advance() {
    let h = Harness::new().await;
    let principal = learner(SubscriptionTier::Free);
    let mut session = h.player().open(&strings(), &principal).await.unwrap();

    let later = h.player_at(fixed_now() + Duration::seconds(7 * 60 + 30));
    later.advance(&mut session).await.unwrap();
    assert_eq!(session.progress().time_spent_minutes, 7);

    let even_later = h.player_at(fixed_now() + Duration::minutes(10));
    even_later.advance(&mut session).await.unwrap();
    assert_eq!(session.progress().time_spent_minutes, 10);
}

#[tokio::test]
async fn local_actions_validate_without_touching_the_store() {
    let h = Harness::new().await;
    let player = h.player();
    let mut session = player
        .open(&strings(), &learner(SubscriptionTier::Free))
        .await
        .unwrap();

    assert!(matches!(
        player.submit_quiz_answer(&mut session, QuestionId::new(1), 0),
        Err(PlayerError::Validation(ValidationError::NotAQuiz))
    ));
    assert!(matches!(
        player.trigger_interaction(&mut session, 0),
        Err(PlayerError::Validation(ValidationError::NotInteractive))
    ));
    assert!(matches!(
        player.jump_to(&mut session, 5).await,
        Err(PlayerError::Validation(ValidationError::Sequence(
            SequenceError::StepOutOfRange { index: 5, total: 5 }
        )))
    ));
    assert_eq!(h.progress.updates(), 0);

    to_quiz(&player, &mut session).await;
    let writes = h.progress.updates();

    assert!(matches!(
        player.submit_quiz_answer(&mut session, QuestionId::new(2), 0),
        Err(PlayerError::Validation(ValidationError::Quiz(
            QuizError::InactiveQuestion { .. }
        )))
    ));
    assert!(matches!(
        player.next_question(&mut session),
        Err(PlayerError::Validation(ValidationError::Quiz(
            QuizError::Unanswered(_)
        )))
    ));
    assert!(matches!(
        player.previous_question(&mut session),
        Err(PlayerError::Validation(ValidationError::Quiz(
            QuizError::AtFirstQuestion
        )))
    ));
    player
        .submit_quiz_answer(&mut session, QuestionId::new(1), 3)
        .unwrap();
    assert_eq!(
        player.next_question(&mut session).unwrap(),
        QuizProgress::Question(1)
    );
    assert_eq!(player.previous_question(&mut session).unwrap(), 0);
    match player.view(&session) {
        SessionView::QuizActive {
            question, answers, ..
        } => {
            assert_eq!(question.selected, Some(3));
            assert_eq!(answers.len(), 1);
        }
        other => panic!("expected active quiz, got {other:?}"),
    }
    assert!(matches!(
        player.retry_quiz(&mut session),
        Err(PlayerError::Validation(ValidationError::Quiz(
            QuizError::RetryUnavailable
        )))
    ));
    assert_eq!(h.progress.updates(), writes);
}

#[tokio::test]
async fn views_serialize_with_a_state_tag() {
    let h = Harness::new().await;
    let player = h.player();
    let mut session = player
        .open(&strings(), &learner(SubscriptionTier::Free))
        .await
        .unwrap();
    player.advance(&mut session).await.unwrap();
    player.advance(&mut session).await.unwrap();

    let json = serde_json::to_value(player.view(&session)).unwrap();
    assert_eq!(json["state"], "active");
    assert_eq!(json["step"]["step_type"], "interactive");
    assert_eq!(json["interactions"]["required"], 3);

    let err = SessionView::error(&PlayerError::NotFound(strings()));
    let json = serde_json::to_value(err).unwrap();
    assert_eq!(json["state"], "error");
    assert_eq!(json["kind"], "not_found");
    assert_eq!(json["recoverable"], false);
}

#[tokio::test]
async fn jumping_to_the_current_quiz_step_keeps_answers() {
    let h = Harness::new().await;
    let player = h.player();
    let mut session = player
        .open(&strings(), &learner(SubscriptionTier::Free))
        .await
        .unwrap();
    to_quiz(&player, &mut session).await;

    player
        .submit_quiz_answer(&mut session, QuestionId::new(1), 0)
        .unwrap();
    assert_eq!(
        player.next_question(&mut session).unwrap(),
        QuizProgress::Question(1)
    );
    player
        .submit_quiz_answer(&mut session, QuestionId::new(2), 1)
        .unwrap();
    let writes = h.progress.updates();

    player.jump_to(&mut session, 4).await.unwrap();

    assert_eq!(h.progress.updates(), writes);
    assert_eq!(session.current_step(), 4);
    let StepActivity::Quiz(attempt) = session.activity() else {
        panic!("expected the quiz to stay active");
    };
    assert_eq!(attempt.cursor(), 1);
    assert_eq!(attempt.answers().len(), 2);
}
