#![forbid(unsafe_code)]

pub mod repository;
pub mod sample;
pub mod sqlite;

pub use repository::{
    InMemoryRepository, LessonFilter, LessonRepository, ProgressRepository, Storage, StorageError,
};
