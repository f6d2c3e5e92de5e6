#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod exam;
pub mod submission;

pub use exam_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, ExamSessionError, SubmissionError};
pub use exam::{
    EXAM_DURATION_SECS, EventOutcome, ExamSessionService, SessionEvent, default_exam_duration,
};
pub use submission::{
    HttpSubmissionService, StaticSubmission, SubmissionApi, SubmissionConfig, SubmissionReceipt,
};
