use exam_core::model::{IntegrityEvent, IntegrityWarning, QuestionKey};

use crate::submission::SubmissionReceipt;

/// Typed inbound events feeding the exam state machine.
///
/// Every trigger — user input, platform integrity signal, timer tick — is one
/// message, consumed one at a time, so the controller stays deterministic and
/// decoupled from any particular UI host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Select an option for the current question.
    Answer(usize),
    /// Advance the cursor; at the last question this triggers submission.
    Next,
    /// Step back; a no-op at the absolute first question.
    Previous,
    /// Jump to question 0 of a section (tab navigation).
    JumpToSection(usize),
    /// Jump to a question within the current section.
    JumpToQuestion(usize),
    /// A platform integrity signal (blur, tab switch, fullscreen exit, ...).
    Platform(IntegrityEvent),
    /// The user acknowledged the pending integrity warning.
    AcknowledgeWarning,
    /// Periodic 1 Hz timer tick; drives deadline expiry.
    Tick,
}

/// What an applied event produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// State may have changed, nothing for the host to act on.
    Continued,
    /// The cursor moved to the given question.
    Moved(QuestionKey),
    /// An integrity warning is now pending acknowledgement.
    WarningRaised(IntegrityWarning),
    /// The pending warning was acknowledged.
    WarningCleared,
    /// Submission succeeded; the session is terminal and storage is cleared.
    Submitted(SubmissionReceipt),
    /// Submission failed; the session and its answers are preserved and the
    /// message is for display.
    SubmissionFailed(String),
    /// The deadline passed. `submitted` reports whether the auto-submit of
    /// partial answers went through.
    Expired { submitted: bool },
}
