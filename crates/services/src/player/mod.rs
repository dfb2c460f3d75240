mod controller;
mod session;
mod view;

// Public API of the lesson player.
pub use crate::error::PlayerError;
pub use controller::LessonPlayerService;
pub use session::{AdvanceOutcome, LessonSession, PreviousOutcome};
pub use view::{ProgressSummary, QuestionView, SessionView, StepView, SubmittedAnswer};
