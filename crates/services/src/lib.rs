#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod content_service;
pub mod error;
pub mod flashcard_service;
pub mod logging;
pub mod progress_service;

pub use luminous_core::Clock;

pub use app_services::AppServices;
pub use config::ServicesConfig;
pub use content_service::{Content, ContentService, parse_payload};
pub use error::{
    AppServicesError, ConfigError, ContentServiceError, FlashcardServiceError,
    ProgressServiceError,
};
pub use flashcard_service::FlashcardService;
pub use logging::init_tracing;
pub use progress_service::ProgressService;
