use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::exam::ExamDefinition;
use crate::model::ids::{ApplicantId, AttemptId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session already completed")]
    Completed,

    #[error("option index {option} out of bounds for {len} options")]
    OptionOutOfBounds { option: usize, len: usize },

    #[error("section index {index} out of bounds for {len} sections")]
    SectionOutOfBounds { index: usize, len: usize },

    #[error("question index {index} out of bounds for {len} questions")]
    QuestionOutOfBounds { index: usize, len: usize },

    #[error("persisted cursor ({section}, {question}) does not fit the exam definition")]
    SnapshotCursorOutOfBounds { section: usize, question: usize },

    #[error("persisted answer for ({section}, {question}) does not fit the exam definition")]
    SnapshotAnswerOutOfBounds { section: usize, question: usize },
}

//
// ─── KEYS & SNAPSHOT ───────────────────────────────────────────────────────────
//

/// Composite key addressing one question within the exam definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionKey {
    pub section: usize,
    pub question: usize,
}

impl QuestionKey {
    #[must_use]
    pub fn new(section: usize, question: usize) -> Self {
        Self { section, question }
    }
}

/// Persisted shape of a session, bridging the domain and the storage port.
///
/// Answers are a list rather than a map so the blob serializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub attempt_id: AttemptId,
    pub applicant: ApplicantId,
    pub current_section: usize,
    pub current_question: usize,
    pub answers: Vec<(QuestionKey, usize)>,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

//
// ─── ADVANCE ───────────────────────────────────────────────────────────────────
//

/// Outcome of a `next` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The cursor moved to a further question.
    Moved { section: usize, question: usize },
    /// The cursor was already at the last question of the last section;
    /// the caller should trigger submission.
    ReadyToSubmit,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// The mutable exam session: cursor, recorded answers, completion flag, and
/// the last submission error. Owns its immutable `ExamDefinition`.
///
/// All transitions are synchronous and bounds-checked; submission itself is
/// the service layer's job (the machine only signals `Advance::ReadyToSubmit`).
pub struct ExamSession {
    definition: ExamDefinition,
    attempt_id: AttemptId,
    applicant: ApplicantId,
    section: usize,
    question: usize,
    answers: HashMap<QuestionKey, usize>,
    completed: bool,
    submission_error: Option<String>,
    started_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
}

impl ExamSession {
    /// Starts a fresh session at the first question of the first section.
    ///
    /// `now` should come from the services layer clock; the deadline is fixed
    /// at `now + duration` and persists across reloads.
    #[must_use]
    pub fn new(
        definition: ExamDefinition,
        applicant: ApplicantId,
        now: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            definition,
            attempt_id: AttemptId::generate(),
            applicant,
            section: 0,
            question: 0,
            answers: HashMap::new(),
            completed: false,
            submission_error: None,
            started_at: now,
            deadline: now + duration,
        }
    }

    /// Rehydrates a session from a persisted snapshot, re-validating every
    /// invariant against the definition.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the cursor or any recorded answer does not
    /// fit the exam definition.
    pub fn from_snapshot(
        definition: ExamDefinition,
        snapshot: SessionSnapshot,
    ) -> Result<Self, SessionError> {
        if definition
            .question(snapshot.current_section, snapshot.current_question)
            .is_none()
        {
            return Err(SessionError::SnapshotCursorOutOfBounds {
                section: snapshot.current_section,
                question: snapshot.current_question,
            });
        }

        let mut answers = HashMap::with_capacity(snapshot.answers.len());
        for (key, option) in snapshot.answers {
            let fits = definition
                .question(key.section, key.question)
                .is_some_and(|q| q.accepts_option(option));
            if !fits {
                return Err(SessionError::SnapshotAnswerOutOfBounds {
                    section: key.section,
                    question: key.question,
                });
            }
            answers.insert(key, option);
        }

        Ok(Self {
            definition,
            attempt_id: snapshot.attempt_id,
            applicant: snapshot.applicant,
            section: snapshot.current_section,
            question: snapshot.current_question,
            answers,
            completed: snapshot.completed,
            submission_error: None,
            started_at: snapshot.started_at,
            deadline: snapshot.deadline,
        })
    }

    /// Serializes the session for the persistence port. Answers are sorted by
    /// key so the blob is stable.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let mut answers: Vec<(QuestionKey, usize)> =
            self.answers.iter().map(|(k, v)| (*k, *v)).collect();
        answers.sort_unstable_by_key(|(key, _)| *key);

        SessionSnapshot {
            attempt_id: self.attempt_id,
            applicant: self.applicant.clone(),
            current_section: self.section,
            current_question: self.question,
            answers,
            completed: self.completed,
            started_at: self.started_at,
            deadline: self.deadline,
        }
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn definition(&self) -> &ExamDefinition {
        &self.definition
    }

    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    #[must_use]
    pub fn applicant(&self) -> &ApplicantId {
        &self.applicant
    }

    /// Current (section, question) cursor.
    #[must_use]
    pub fn cursor(&self) -> QuestionKey {
        QuestionKey::new(self.section, self.question)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn submission_error(&self) -> Option<&str> {
        self.submission_error.as_deref()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Recorded answer for a question, if any.
    #[must_use]
    pub fn answer_for(&self, key: QuestionKey) -> Option<usize> {
        self.answers.get(&key).copied()
    }

    #[must_use]
    pub fn answers(&self) -> &HashMap<QuestionKey, usize> {
        &self.answers
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Completion percentage across all questions, independent of
    /// correctness.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percent(&self) -> f64 {
        let total = self.definition.total_questions();
        if total == 0 {
            return 0.0;
        }
        self.answers.len() as f64 / total as f64 * 100.0
    }

    //
    // ─── TRANSITIONS ───────────────────────────────────────────────────────────
    //

    /// Records the selected option for the current question without moving
    /// the cursor. Re-answering overwrites (last write wins).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after a successful submission, or
    /// `SessionError::OptionOutOfBounds` for an invalid option index.
    pub fn answer(&mut self, option: usize) -> Result<(), SessionError> {
        let current = self.require_in_progress()?;
        if !current.accepts_option(option) {
            return Err(SessionError::OptionOutOfBounds {
                option,
                len: current.options().len(),
            });
        }
        self.answers.insert(self.cursor(), option);
        Ok(())
    }

    /// Advances the cursor: next question in the section, else question 0 of
    /// the next section, else signals readiness to submit.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the session is terminal.
    pub fn next(&mut self) -> Result<Advance, SessionError> {
        self.require_in_progress()?;

        let section_len = self.definition.sections()[self.section].len();
        if self.question + 1 < section_len {
            self.question += 1;
        } else if self.section + 1 < self.definition.section_count() {
            self.section += 1;
            self.question = 0;
        } else {
            return Ok(Advance::ReadyToSubmit);
        }

        Ok(Advance::Moved {
            section: self.section,
            question: self.question,
        })
    }

    /// Moves the cursor back: previous question in the section, else the
    /// **last** question of the previous section. No-op at the absolute first
    /// question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the session is terminal.
    pub fn previous(&mut self) -> Result<(), SessionError> {
        self.require_in_progress()?;

        if self.question > 0 {
            self.question -= 1;
        } else if self.section > 0 {
            self.section -= 1;
            self.question = self.definition.sections()[self.section].len() - 1;
        }
        Ok(())
    }

    /// Jumps to question 0 of the given section.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` or `SessionError::SectionOutOfBounds`.
    pub fn jump_to_section(&mut self, index: usize) -> Result<(), SessionError> {
        self.require_in_progress()?;
        if index >= self.definition.section_count() {
            return Err(SessionError::SectionOutOfBounds {
                index,
                len: self.definition.section_count(),
            });
        }
        self.section = index;
        self.question = 0;
        Ok(())
    }

    /// Jumps to a question within the current section.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` or `SessionError::QuestionOutOfBounds`.
    pub fn jump_to_question(&mut self, index: usize) -> Result<(), SessionError> {
        self.require_in_progress()?;
        let len = self.definition.sections()[self.section].len();
        if index >= len {
            return Err(SessionError::QuestionOutOfBounds { index, len });
        }
        self.question = index;
        Ok(())
    }

    /// Marks the session terminal after a successful submission.
    pub fn complete(&mut self) {
        self.completed = true;
        self.submission_error = None;
    }

    /// Stores a failed submission message verbatim for display.
    pub fn set_submission_error(&mut self, message: impl Into<String>) {
        self.submission_error = Some(message.into());
    }

    /// Clears the stored error when a retry starts.
    pub fn clear_submission_error(&mut self) {
        self.submission_error = None;
    }

    /// Whether the deadline has passed at the given instant.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    fn require_in_progress(&self) -> Result<&crate::model::exam::Question, SessionError> {
        if self.completed {
            return Err(SessionError::Completed);
        }
        self.definition
            .question(self.section, self.question)
            .ok_or(SessionError::SnapshotCursorOutOfBounds {
                section: self.section,
                question: self.question,
            })
    }
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("attempt_id", &self.attempt_id)
            .field("cursor", &(self.section, self.question))
            .field("answered", &self.answers.len())
            .field("completed", &self.completed)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExamDefinition;
    use crate::time::fixed_now;

    fn start_sample() -> ExamSession {
        ExamSession::new(
            ExamDefinition::sample(),
            ApplicantId::new("tok-1").unwrap(),
            fixed_now(),
            Duration::seconds(3600),
        )
    }

    #[test]
    fn re_answer_overwrites() {
        let mut session = start_sample();
        session.answer(0).unwrap();
        session.answer(1).unwrap();
        assert_eq!(session.answer_for(QuestionKey::new(0, 0)), Some(1));
        assert_eq!(session.answered_count(), 1);
    }

    #[test]
    fn answer_rejects_out_of_bounds_option() {
        let mut session = start_sample();
        let err = session.answer(99).unwrap_err();
        assert!(matches!(err, SessionError::OptionOutOfBounds { .. }));
    }

    #[test]
    fn next_walks_sections_in_order() {
        let mut session = start_sample();
        assert_eq!(
            session.next().unwrap(),
            Advance::Moved {
                section: 0,
                question: 1
            }
        );
        assert_eq!(
            session.next().unwrap(),
            Advance::Moved {
                section: 1,
                question: 0
            }
        );
    }

    #[test]
    fn next_at_last_question_signals_submit_without_moving() {
        let mut session = start_sample();
        session.jump_to_section(3).unwrap();
        session.jump_to_question(1).unwrap();
        assert_eq!(session.next().unwrap(), Advance::ReadyToSubmit);
        assert_eq!(session.cursor(), QuestionKey::new(3, 1));
    }

    #[test]
    fn previous_inverts_next_at_interior_points() {
        let mut session = start_sample();
        let before = session.cursor();
        session.next().unwrap();
        session.previous().unwrap();
        assert_eq!(session.cursor(), before);

        // Across a section boundary too.
        session.jump_to_section(1).unwrap();
        session.previous().unwrap();
        assert_eq!(session.cursor(), QuestionKey::new(0, 1));
    }

    #[test]
    fn previous_at_absolute_first_question_is_a_no_op() {
        let mut session = start_sample();
        session.previous().unwrap();
        assert_eq!(session.cursor(), QuestionKey::new(0, 0));
    }

    #[test]
    fn completed_session_rejects_mutation() {
        let mut session = start_sample();
        session.complete();
        assert!(matches!(session.answer(0), Err(SessionError::Completed)));
        assert!(matches!(session.next(), Err(SessionError::Completed)));
        assert!(matches!(session.previous(), Err(SessionError::Completed)));
    }

    #[test]
    fn snapshot_round_trips_cursor_and_answers() {
        let mut session = start_sample();
        session.answer(0).unwrap();
        session.next().unwrap();
        session.next().unwrap();
        session.answer(1).unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.current_section, 1);
        assert_eq!(snapshot.current_question, 0);

        let restored =
            ExamSession::from_snapshot(ExamDefinition::sample(), snapshot.clone()).unwrap();
        assert_eq!(restored.cursor(), session.cursor());
        assert_eq!(restored.answers(), session.answers());
        assert_eq!(restored.deadline(), session.deadline());
        assert_eq!(restored.attempt_id(), session.attempt_id());
        assert_eq!(restored.snapshot(), snapshot);
    }

    #[test]
    fn snapshot_with_invalid_cursor_is_rejected() {
        let session = start_sample();
        let mut snapshot = session.snapshot();
        snapshot.current_section = 9;
        let err = ExamSession::from_snapshot(ExamDefinition::sample(), snapshot).unwrap_err();
        assert!(matches!(err, SessionError::SnapshotCursorOutOfBounds { .. }));
    }

    #[test]
    fn snapshot_with_invalid_answer_is_rejected() {
        let session = start_sample();
        let mut snapshot = session.snapshot();
        snapshot.answers.push((QuestionKey::new(0, 7), 0));
        let err = ExamSession::from_snapshot(ExamDefinition::sample(), snapshot).unwrap_err();
        assert!(matches!(err, SessionError::SnapshotAnswerOutOfBounds { .. }));
    }

    #[test]
    fn progress_tracks_completion_not_correctness() {
        let mut session = start_sample();
        // Deliberately wrong answer still counts toward progress.
        session.answer(2).unwrap();
        assert!((session.progress_percent() - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn deadline_is_fixed_at_start() {
        let session = start_sample();
        assert_eq!(
            session.deadline() - session.started_at(),
            Duration::seconds(3600)
        );
        assert!(!session.is_expired(session.started_at()));
        assert!(session.is_expired(session.deadline()));
    }
}
