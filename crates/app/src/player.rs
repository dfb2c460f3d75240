//! Line-driven lesson player on top of `LessonPlayerService`.

use std::fmt::Write as _;

use lesson_core::model::StepContent;
use services::player::{ProgressSummary, StepView};
use services::{
    AdvanceOutcome, LessonPlayerService, LessonSession, PlayerError, PreviousOutcome, SessionView,
};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0} (type `help`)")]
    Unknown(String),
    #[error("`{command}` needs a number")]
    MissingNumber { command: &'static str },
    #[error("`{command}` expects a number from 1, got {raw}")]
    InvalidNumber { command: &'static str, raw: String },
}

/// One learner input. Numbers are typed 1-based and stored 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Next,
    Prev,
    Goto(usize),
    Touch(u8),
    Answer(usize),
    QuestionNext,
    QuestionPrev,
    Retry,
    Show,
    Help,
    Quit,
}

fn one_based<T: TryFrom<usize>>(
    command: &'static str,
    raw: Option<&str>,
) -> Result<T, CommandError> {
    let raw = raw.ok_or(CommandError::MissingNumber { command })?;
    raw.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| CommandError::InvalidNumber {
            command,
            raw: raw.to_owned(),
        })
}

impl PlayerCommand {
    /// # Errors
    ///
    /// Returns `CommandError` for unknown words or bad numeric arguments.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Ok(PlayerCommand::Show);
        };
        let arg = words.next();
        match word.to_ascii_lowercase().as_str() {
            "next" | "n" => Ok(PlayerCommand::Next),
            "prev" | "p" => Ok(PlayerCommand::Prev),
            "goto" | "g" => one_based("goto", arg).map(PlayerCommand::Goto),
            "touch" | "t" => one_based("touch", arg).map(PlayerCommand::Touch),
            "answer" | "a" => one_based("answer", arg).map(PlayerCommand::Answer),
            "q-next" => Ok(PlayerCommand::QuestionNext),
            "q-prev" => Ok(PlayerCommand::QuestionPrev),
            "retry" => Ok(PlayerCommand::Retry),
            "show" => Ok(PlayerCommand::Show),
            "help" | "?" => Ok(PlayerCommand::Help),
            "quit" | "exit" | "q" => Ok(PlayerCommand::Quit),
            other => Err(CommandError::Unknown(other.to_owned())),
        }
    }
}

const HELP: &str = "\
commands:
  next | prev          move between steps
  goto <n>             review step n
  touch <string>       play a fretboard string (1 = high E .. 6 = low E)
  answer <option>      choose an option for the current question
  q-next | q-prev      move between quiz questions
  retry                start a failed quiz over
  show | help | quit";

//
// ─── RENDERING ─────────────────────────────────────────────────────────────────
//

fn progress_line(out: &mut String, progress: &ProgressSummary) {
    let _ = writeln!(
        out,
        "[step {}/{} | {}% | {} | {} min]",
        progress.current_step + 1,
        progress.total_steps,
        progress.percentage,
        progress.status.label(),
        progress.time_spent_minutes
    );
}

fn step_body(out: &mut String, step: &StepView) {
    let _ = writeln!(out, "== {} ({}) ==", step.title, step.step_type);
    match &step.content {
        StepContent::Intro(intro) => {
            let _ = writeln!(out, "{}\n\n{}", intro.title, intro.body);
            for point in &intro.key_points {
                let _ = writeln!(out, "  * {point}");
            }
        }
        StepContent::Theory(theory) => {
            let _ = writeln!(out, "{}", theory.title);
            for fact in &theory.key_facts {
                let _ = writeln!(out, "  {}: {}", fact.title, fact.body);
            }
            for string in &theory.string_names {
                let _ = writeln!(
                    out,
                    "  string {}: {} ({}) {}",
                    string.number, string.name, string.name_english, string.note
                );
            }
        }
        StepContent::Interactive(interactive) => {
            let _ = writeln!(out, "{}\n{}", interactive.title, interactive.instructions);
            for required in &interactive.required_interactions {
                let _ = writeln!(out, "  - {}", required.label);
            }
        }
        StepContent::Practice(practice) => {
            let _ = writeln!(out, "{}\n{}", practice.title, practice.instructions);
            for tip in &practice.tips {
                let _ = writeln!(out, "  tip: {tip}");
            }
            if let Some(minutes) = practice.duration_minutes {
                let _ = writeln!(out, "  about {minutes} min");
            }
        }
        StepContent::Quiz(quiz) => {
            let _ = writeln!(
                out,
                "{} questions, {}% to pass",
                quiz.questions.len(),
                quiz.passing_score
            );
        }
    }
}

#[must_use]
pub fn render(view: &SessionView) -> String {
    let mut out = String::new();
    match view {
        SessionView::Loading => out.push_str("loading..."),
        SessionView::Error {
            kind,
            message,
            recoverable,
        } => {
            let hint = if *recoverable { "try again" } else { "cannot continue" };
            let _ = write!(out, "error ({kind:?}): {message} [{hint}]");
        }
        SessionView::Active {
            step,
            progress,
            interactions,
        } => {
            progress_line(&mut out, progress);
            step_body(&mut out, step);
            if let Some(done) = interactions {
                let _ = write!(out, "played {}/{}", done.completed, done.required);
            }
        }
        SessionView::QuizActive {
            step,
            question,
            position,
            total_questions,
            progress,
            ..
        } => {
            progress_line(&mut out, progress);
            let _ = writeln!(
                out,
                "{}: question {}/{}",
                step.title,
                position + 1,
                total_questions
            );
            let _ = writeln!(out, "{}", question.prompt);
            for (i, option) in question.options.iter().enumerate() {
                let marker = if question.selected == Some(i) { '>' } else { ' ' };
                let _ = writeln!(out, " {marker} {}. {option}", i + 1);
            }
        }
        SessionView::QuizResult {
            score,
            passed,
            passing_score,
            breakdown,
            progress,
            ..
        } => {
            progress_line(&mut out, progress);
            let verdict = if *passed { "passed" } else { "not passed" };
            let _ = writeln!(out, "score {score}% ({verdict}, {passing_score}% needed)");
            for outcome in breakdown {
                let mark = if outcome.is_correct { "ok" } else { "x " };
                let _ = writeln!(
                    out,
                    "  {mark} question {}: {}",
                    outcome.question_id, outcome.explanation
                );
            }
            out.push_str(if *passed {
                "type `next` to finish"
            } else {
                "type `retry` to try again"
            });
        }
        SessionView::LessonComplete { progress } => {
            progress_line(&mut out, progress);
            out.push_str("lesson complete!");
        }
    }
    out
}

//
// ─── LOOP ──────────────────────────────────────────────────────────────────────
//

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

async fn apply(
    player: &LessonPlayerService,
    session: &mut LessonSession,
    command: PlayerCommand,
) -> Result<Flow, PlayerError> {
    match command {
        PlayerCommand::Next => {
            if player.advance(session).await? == AdvanceOutcome::LessonComplete {
                tracing::debug!(lesson_id = %session.lesson().id(), "finished in terminal player");
            }
        }
        PlayerCommand::Prev => {
            if player.previous(session).await? == PreviousOutcome::Exit {
                return Ok(Flow::Stop);
            }
        }
        PlayerCommand::Goto(index) => player.jump_to(session, index).await?,
        PlayerCommand::Touch(target) => {
            player.trigger_interaction(session, target)?;
        }
        PlayerCommand::Answer(option) => {
            let question = match player.view(session) {
                SessionView::QuizActive { question, .. } => question.id,
                _ => return Err(services::ValidationError::NotAQuiz.into()),
            };
            player.submit_quiz_answer(session, question, option)?;
        }
        PlayerCommand::QuestionNext => {
            player.next_question(session)?;
        }
        PlayerCommand::QuestionPrev => {
            player.previous_question(session)?;
        }
        PlayerCommand::Retry => player.retry_quiz(session)?,
        PlayerCommand::Show | PlayerCommand::Help => {}
        PlayerCommand::Quit => return Ok(Flow::Stop),
    }
    Ok(Flow::Continue)
}

/// Reads commands from `input` until the learner quits, leaves the lesson, or input ends.
///
/// # Errors
///
/// Returns an I/O error if reading input fails.
pub async fn run_session<R>(
    player: &LessonPlayerService,
    session: &mut LessonSession,
    input: R,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    println!("{}", render(&player.view(session)));
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let command = match PlayerCommand::parse(&line) {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        if command == PlayerCommand::Help {
            println!("{HELP}");
            continue;
        }

        match apply(player, session, command).await {
            Ok(Flow::Stop) => break,
            Ok(Flow::Continue) => println!("{}", render(&player.view(session))),
            Err(err) if err.is_recoverable() => println!("{}", render(&SessionView::error(&err))),
            Err(err) => {
                println!("{}", render(&SessionView::error(&err)));
                break;
            }
        }
    }
    Ok(())
}
