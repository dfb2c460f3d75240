mod ids;
mod lesson;
mod principal;
mod progress;
pub mod step;

pub use ids::{LessonId, ParseIdError, PrincipalId, QuestionId, StepId};
pub use lesson::{Lesson, LessonError, LessonMeta, LessonRef};
pub use principal::{ParseTierError, Principal, SubscriptionTier};
pub use progress::{ProgressError, ProgressRecord, ProgressStatus, ProgressUpdate};
pub use step::{
    ContentError, InteractiveContent, IntroContent, KeyFact, PracticeContent, Question,
    QuizContent, RequiredInteraction, Step, StepContent, StepType, StringName, TheoryContent,
};
