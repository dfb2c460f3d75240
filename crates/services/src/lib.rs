#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod error;
pub mod player;
pub mod progress;

pub use lesson_core::Clock;

pub use app_services::AppServices;
pub use catalog::{LessonCatalogService, LessonOverview, status_label};
pub use error::{AppServicesError, CatalogError, ErrorKind, PlayerError, ValidationError};
pub use player::{
    AdvanceOutcome, LessonPlayerService, LessonSession, PreviousOutcome, SessionView,
};
pub use progress::ProgressStore;
