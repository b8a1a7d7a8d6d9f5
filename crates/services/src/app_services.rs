use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::config::ServicesConfig;
use crate::content_service::ContentService;
use crate::error::AppServicesError;
use crate::flashcard_service::FlashcardService;
use crate::progress_service::ProgressService;

/// Assembles the content, progress and flashcard services over one storage.
#[derive(Clone)]
pub struct AppServices {
    config: ServicesConfig,
    content: Arc<ContentService>,
    progress: Arc<ProgressService>,
    flashcards: Arc<FlashcardService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage at `config.database_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(config: ServicesConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.database_url).await?;
        tracing::info!(database_url = %config.database_url, "storage ready");
        Ok(Self::with_storage(config, clock, storage))
    }

    /// Read configuration from the environment, then build `SQLite`-backed services.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` for invalid configuration or storage failures.
    pub async fn from_env(clock: Clock) -> Result<Self, AppServicesError> {
        let config = ServicesConfig::from_env()?;
        Self::new_sqlite(config, clock).await
    }

    #[must_use]
    pub fn in_memory(config: ServicesConfig, clock: Clock) -> Self {
        Self::with_storage(config, clock, Storage::in_memory())
    }

    #[must_use]
    pub fn with_storage(config: ServicesConfig, clock: Clock, storage: Storage) -> Self {
        let content = Arc::new(ContentService::new(clock, storage.clone()));
        let progress = Arc::new(ProgressService::new(
            clock,
            config.match_policy,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.quick_learns),
        ));
        let flashcards = Arc::new(FlashcardService::new(
            clock,
            config.match_policy,
            config.learn_session_size,
            &storage,
        ));

        Self {
            config,
            content,
            progress,
            flashcards,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServicesConfig {
        &self.config
    }

    #[must_use]
    pub fn content(&self) -> Arc<ContentService> {
        Arc::clone(&self.content)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn flashcards(&self) -> Arc<FlashcardService> {
        Arc::clone(&self.flashcards)
    }
}
