use std::sync::Arc;

use lesson_core::{EntitlementGate, SubscriptionGate};
use storage::repository::Storage;

use crate::Clock;
use crate::catalog::LessonCatalogService;
use crate::error::AppServicesError;
use crate::player::LessonPlayerService;
use crate::progress::ProgressStore;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    catalog: Arc<LessonCatalogService>,
    player: Arc<LessonPlayerService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, Arc::new(SubscriptionGate)))
    }

    /// Wire services over an already built storage, e.g. `Storage::in_memory()`.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, gate: Arc<dyn EntitlementGate>) -> Self {
        let catalog = LessonCatalogService::new(
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.progress),
        );
        let progress = ProgressStore::new(clock, Arc::clone(&storage.progress));
        let player = LessonPlayerService::new(clock, catalog.clone(), progress, gate);

        Self {
            catalog: Arc::new(catalog),
            player: Arc::new(player),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<LessonCatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn player(&self) -> Arc<LessonPlayerService> {
        Arc::clone(&self.player)
    }
}
