//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{ProfileError, QuestionError, RatingError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `QuestionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionServiceError {
    #[error(transparent)]
    InvalidQuestion(#[from] QuestionError),
    #[error("draft {index} is invalid: {source}")]
    InvalidDraft {
        index: usize,
        #[source]
        source: QuestionError,
    },
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SelectionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SelectionError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AnswerService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnswerServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `RatingService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RatingServiceError {
    #[error(transparent)]
    InvalidRating(#[from] RatingError),
    #[error("rating update kept conflicting after {attempts} attempts")]
    ConcurrentUpdateConflict { attempts: u32 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `LeaderboardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LeaderboardError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProfileService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProfileServiceError {
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `MaintenanceService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MaintenanceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by question extractors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractionError {
    #[error("question extraction is not configured")]
    Disabled,
    #[error("question extraction returned an empty response")]
    EmptyResponse,
    #[error("question extraction request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("could not parse extracted questions: {0}")]
    Parse(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
