//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{EmptyApplicantToken, ExamError, SessionError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by submission adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("{0}")]
    Rejected(String),
    #[error("submission endpoint returned status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `ExamSessionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamSessionError {
    #[error("applicant identity is missing; verification must run first")]
    MissingIdentity,
    #[error("a submission attempt is already in flight")]
    SubmissionInFlight,
    #[error("an integrity warning is pending acknowledgement")]
    WarningPending,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Identity(#[from] EmptyApplicantToken),
}
