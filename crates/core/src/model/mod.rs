mod exam;
mod ids;
mod integrity;
mod session;

pub use exam::{ExamDefinition, ExamError, Question, Section};
pub use ids::{ApplicantId, AttemptId, EmptyApplicantToken};
pub use integrity::{IntegrityEvent, IntegrityMonitor, IntegrityWarning};
pub use session::{Advance, ExamSession, QuestionKey, SessionError, SessionSnapshot};
