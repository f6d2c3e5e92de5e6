mod events;
mod service;

// Public API of the exam subsystem.
pub use crate::error::ExamSessionError;
pub use events::{EventOutcome, SessionEvent};
pub use service::{EXAM_DURATION_SECS, ExamSessionService, default_exam_duration};
