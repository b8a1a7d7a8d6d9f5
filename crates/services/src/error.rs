//! Shared error types for the services crate.

use thiserror::Error;

use luminous_core::ContentError;
use luminous_core::mastery::MasteryError;
use luminous_core::model::{LearnError, ProgressError, QuestionError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ContentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContentServiceError {
    #[error("malformed content: {0}")]
    Malformed(#[from] ContentError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `FlashcardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlashcardServiceError {
    #[error("flashcard set has no cards to study")]
    Empty,
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Learn(#[from] LearnError),
    #[error(transparent)]
    Mastery(#[from] MasteryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Invalid configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} must be true or false, got {value:?}")]
    InvalidBool { var: &'static str, value: String },
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidCount { var: &'static str, value: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
