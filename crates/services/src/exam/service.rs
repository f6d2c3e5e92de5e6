use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use exam_core::model::{
    Advance, ExamDefinition, ExamSession, IntegrityMonitor, IntegrityWarning, QuestionKey,
    SessionError,
};
use exam_core::scoring::{self, SubjectScores};
use exam_core::{Clock, Countdown};
use storage::repository::SessionStore;

use crate::error::ExamSessionError;
use crate::exam::events::{EventOutcome, SessionEvent};
use crate::submission::SubmissionApi;

/// Fixed exam duration in seconds: one hour.
pub const EXAM_DURATION_SECS: i64 = 3600;

/// Fixed exam duration as a `chrono::Duration`.
#[must_use]
pub fn default_exam_duration() -> Duration {
    Duration::seconds(EXAM_DURATION_SECS)
}

/// The exam session controller.
///
/// Owns the state machine, persists a snapshot after every mutation, guards
/// submission reentrancy, and turns platform signals into integrity warnings.
/// All inbound triggers arrive as [`SessionEvent`]s applied one at a time.
pub struct ExamSessionService {
    clock: Clock,
    store: Arc<dyn SessionStore>,
    submission: Arc<dyn SubmissionApi>,
    session: ExamSession,
    monitor: IntegrityMonitor,
    submitting: bool,
}

impl std::fmt::Debug for ExamSessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExamSessionService")
            .field("clock", &self.clock)
            .field("session", &self.session)
            .field("monitor", &self.monitor)
            .field("submitting", &self.submitting)
            .finish_non_exhaustive()
    }
}

impl ExamSessionService {
    /// Resumes the resident session if one is persisted, else starts a fresh
    /// one at the first question. The applicant identity must already exist
    /// in the store (established by the verification step).
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::MissingIdentity` if no identity token is
    /// stored, a `Session` error if the persisted snapshot does not fit the
    /// definition, or a `Storage` error for backend failures.
    pub async fn start_or_resume(
        definition: ExamDefinition,
        store: Arc<dyn SessionStore>,
        submission: Arc<dyn SubmissionApi>,
        clock: Clock,
    ) -> Result<Self, ExamSessionError> {
        let applicant = store
            .load_identity()
            .await?
            .ok_or(ExamSessionError::MissingIdentity)?;

        let session = match store.load_session().await? {
            Some(snapshot) if !snapshot.completed => {
                let session = ExamSession::from_snapshot(definition, snapshot)?;
                info!(
                    attempt = %session.attempt_id(),
                    cursor = ?session.cursor(),
                    answered = session.answered_count(),
                    "resumed persisted exam session"
                );
                session
            }
            leftover => {
                // A completed leftover should have been cleared on submit;
                // treat it as stale and start over.
                if leftover.is_some() {
                    store.clear_session().await?;
                }
                let session = ExamSession::new(
                    definition,
                    applicant,
                    clock.now(),
                    default_exam_duration(),
                );
                info!(attempt = %session.attempt_id(), "started fresh exam session");
                session
            }
        };

        let service = Self {
            clock,
            store,
            submission,
            session,
            monitor: IntegrityMonitor::new(),
            submitting: false,
        };
        service.persist().await?;
        Ok(service)
    }

    /// Applies one inbound event to the state machine.
    ///
    /// Answer and navigation events are rejected while an integrity warning
    /// is pending; `Tick` and platform events are always accepted.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError` for invalid transitions, a pending warning,
    /// a submission already in flight, or storage failures. Submission
    /// *failures* are not errors: they surface as
    /// [`EventOutcome::SubmissionFailed`] so the session can be retried.
    pub async fn apply(&mut self, event: SessionEvent) -> Result<EventOutcome, ExamSessionError> {
        match event {
            SessionEvent::Tick => self.on_tick().await,
            SessionEvent::Platform(platform) => {
                let warning = self.monitor.observe(platform, self.clock.now()).clone();
                warn!(event = %warning.event, "integrity warning raised");
                Ok(EventOutcome::WarningRaised(warning))
            }
            SessionEvent::AcknowledgeWarning => {
                self.monitor.acknowledge();
                Ok(EventOutcome::WarningCleared)
            }
            SessionEvent::Answer(option) => {
                self.guard_warning()?;
                self.session.answer(option)?;
                self.persist().await?;
                Ok(EventOutcome::Continued)
            }
            SessionEvent::Next => {
                self.guard_warning()?;
                match self.session.next()? {
                    Advance::Moved { section, question } => {
                        self.persist().await?;
                        Ok(EventOutcome::Moved(QuestionKey::new(section, question)))
                    }
                    Advance::ReadyToSubmit => self.submit().await,
                }
            }
            SessionEvent::Previous => {
                self.guard_warning()?;
                self.session.previous()?;
                self.persist().await?;
                Ok(EventOutcome::Moved(self.session.cursor()))
            }
            SessionEvent::JumpToSection(index) => {
                self.guard_warning()?;
                self.session.jump_to_section(index)?;
                self.persist().await?;
                Ok(EventOutcome::Moved(self.session.cursor()))
            }
            SessionEvent::JumpToQuestion(index) => {
                self.guard_warning()?;
                self.session.jump_to_question(index)?;
                self.persist().await?;
                Ok(EventOutcome::Moved(self.session.cursor()))
            }
        }
    }

    fn guard_warning(&self) -> Result<(), ExamSessionError> {
        if self.monitor.has_pending() {
            return Err(ExamSessionError::WarningPending);
        }
        Ok(())
    }

    /// Computes scores and calls the submission service; at most one attempt
    /// is outstanding at a time.
    ///
    /// On success the session becomes terminal and all persisted keys are
    /// cleared together. On failure everything is preserved and the message
    /// is stored verbatim for display.
    async fn submit(&mut self) -> Result<EventOutcome, ExamSessionError> {
        if self.submitting {
            return Err(ExamSessionError::SubmissionInFlight);
        }
        if self.session.is_complete() {
            return Err(SessionError::Completed.into());
        }

        self.session.clear_submission_error();
        self.submitting = true;
        let scores = self.scores();
        let result = self
            .submission
            .submit(self.session.applicant(), &scores)
            .await;
        self.submitting = false;

        match result {
            Ok(receipt) => {
                self.session.complete();
                self.store.clear_session().await?;
                info!(attempt = %self.session.attempt_id(), "exam submitted");
                Ok(EventOutcome::Submitted(receipt))
            }
            Err(err) => {
                let message = err.to_string();
                warn!(attempt = %self.session.attempt_id(), error = %message, "submission failed");
                self.session.set_submission_error(message.clone());
                self.persist().await?;
                Ok(EventOutcome::SubmissionFailed(message))
            }
        }
    }

    /// Deadline handling: once the countdown hits zero, auto-submit whatever
    /// answers exist instead of silently discarding them. A tick that races
    /// an in-flight submission defers to that submission's outcome.
    async fn on_tick(&mut self) -> Result<EventOutcome, ExamSessionError> {
        if self.session.is_complete() || self.submitting {
            return Ok(EventOutcome::Continued);
        }
        if !self.session.is_expired(self.clock.now()) {
            return Ok(EventOutcome::Continued);
        }

        info!(
            attempt = %self.session.attempt_id(),
            answered = self.session.answered_count(),
            "exam deadline reached, submitting partial answers"
        );
        let outcome = self.submit().await?;
        Ok(EventOutcome::Expired {
            submitted: matches!(outcome, EventOutcome::Submitted(_)),
        })
    }

    async fn persist(&self) -> Result<(), ExamSessionError> {
        self.store.save_session(&self.session.snapshot()).await?;
        debug!(cursor = ?self.session.cursor(), "session persisted");
        Ok(())
    }

    //
    // ─── VIEW ACCESSORS ────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn session(&self) -> &ExamSession {
        &self.session
    }

    #[must_use]
    pub fn pending_warning(&self) -> Option<&IntegrityWarning> {
        self.monitor.pending()
    }

    /// Total integrity violations observed so far.
    #[must_use]
    pub fn violation_count(&self) -> u32 {
        self.monitor.total()
    }

    /// Current per-subject scores for the recorded answers.
    #[must_use]
    pub fn scores(&self) -> SubjectScores {
        scoring::exam_scores(self.session.definition(), self.session.answers())
    }

    /// Time left on the countdown at this instant.
    #[must_use]
    pub fn time_remaining(&self) -> Duration {
        Countdown::until(self.session.deadline()).remaining(self.clock.now())
    }
}
