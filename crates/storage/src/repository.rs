use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::DateTime;
use thiserror::Error;

use exam_core::model::{ApplicantId, AttemptId, QuestionKey, SessionSnapshot};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Stable keys the session is persisted under. They are scoped to the exam
/// feature, not the applicant: at most one in-progress exam is resident, and
/// starting another resumes or overwrites it.
pub mod keys {
    pub const CURRENT_SECTION: &str = "exam.current_section";
    pub const CURRENT_QUESTION: &str = "exam.current_question";
    pub const ANSWERS: &str = "exam.answers";
    pub const COMPLETED: &str = "exam.completed";
    pub const DEADLINE: &str = "exam.deadline";
    pub const STARTED_AT: &str = "exam.started_at";
    pub const ATTEMPT: &str = "exam.attempt";
    pub const APPLICANT: &str = "exam.applicant";

    /// Identity token written by the prior verification step. Lives outside
    /// the session keys and survives a successful submission.
    pub const IDENTITY: &str = "applicant.identity";

    pub const SESSION_KEYS: [&str; 8] = [
        CURRENT_SECTION,
        CURRENT_QUESTION,
        ANSWERS,
        COMPLETED,
        DEADLINE,
        STARTED_AT,
        ATTEMPT,
        APPLICANT,
    ];
}

fn encode(snapshot: &SessionSnapshot) -> Result<Vec<(&'static str, String)>, StorageError> {
    let answers = serde_json::to_string(&snapshot.answers)
        .map_err(|err| StorageError::Serialization(err.to_string()))?;
    Ok(vec![
        (keys::CURRENT_SECTION, snapshot.current_section.to_string()),
        (keys::CURRENT_QUESTION, snapshot.current_question.to_string()),
        (keys::ANSWERS, answers),
        (keys::COMPLETED, snapshot.completed.to_string()),
        (keys::DEADLINE, snapshot.deadline.to_rfc3339()),
        (keys::STARTED_AT, snapshot.started_at.to_rfc3339()),
        (keys::ATTEMPT, snapshot.attempt_id.to_string()),
        (keys::APPLICANT, snapshot.applicant.as_str().to_owned()),
    ])
}

fn decode(values: &HashMap<String, String>) -> Result<Option<SessionSnapshot>, StorageError> {
    // The cursor keys are the marker for a resident session. Anything less
    // than the full key set from there on is corrupt, not absent.
    let Some(section) = values.get(keys::CURRENT_SECTION) else {
        return Ok(None);
    };

    fn require<'a>(
        values: &'a HashMap<String, String>,
        key: &str,
    ) -> Result<&'a str, StorageError> {
        values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| StorageError::Serialization(format!("missing key: {key}")))
    }

    fn invalid(key: &str, err: impl std::fmt::Display) -> StorageError {
        StorageError::Serialization(format!("invalid value for {key}: {err}"))
    }

    let current_section: usize = section
        .parse()
        .map_err(|err| invalid(keys::CURRENT_SECTION, err))?;
    let current_question: usize = require(values, keys::CURRENT_QUESTION)?
        .parse()
        .map_err(|err| invalid(keys::CURRENT_QUESTION, err))?;
    let answers: Vec<(QuestionKey, usize)> = serde_json::from_str(require(values, keys::ANSWERS)?)
        .map_err(|err| invalid(keys::ANSWERS, err))?;
    let completed: bool = require(values, keys::COMPLETED)?
        .parse()
        .map_err(|err| invalid(keys::COMPLETED, err))?;
    let deadline = DateTime::parse_from_rfc3339(require(values, keys::DEADLINE)?)
        .map_err(|err| invalid(keys::DEADLINE, err))?
        .to_utc();
    let started_at = DateTime::parse_from_rfc3339(require(values, keys::STARTED_AT)?)
        .map_err(|err| invalid(keys::STARTED_AT, err))?
        .to_utc();
    let attempt_id = require(values, keys::ATTEMPT)?
        .parse()
        .map(AttemptId::from_uuid)
        .map_err(|err| invalid(keys::ATTEMPT, err))?;
    let applicant: ApplicantId = require(values, keys::APPLICANT)?
        .parse()
        .map_err(|err| invalid(keys::APPLICANT, err))?;

    Ok(Some(SessionSnapshot {
        attempt_id,
        applicant,
        current_section,
        current_question,
        answers,
        completed,
        started_at,
        deadline,
    }))
}

/// The injected persistence port for the exam session.
///
/// Adapters implement the three key/value primitives; the session-level
/// operations are provided on top of them so every backend shares one
/// encoding.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Write one key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn save_value(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Read one key, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn load_value(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Delete one key; deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn remove_value(&self, key: &str) -> Result<(), StorageError>;

    /// Persist the full session snapshot under the stable keys.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or any write fails.
    async fn save_session(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError> {
        for (key, value) in encode(snapshot)? {
            self.save_value(key, &value).await?;
        }
        Ok(())
    }

    /// Load the resident session, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the resident keys are corrupt
    /// or incomplete.
    async fn load_session(&self) -> Result<Option<SessionSnapshot>, StorageError> {
        let mut values = HashMap::new();
        for key in keys::SESSION_KEYS {
            if let Some(value) = self.load_value(key).await? {
                values.insert(key.to_owned(), value);
            }
        }
        decode(&values)
    }

    /// Delete all session keys together (successful submission only).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn clear_session(&self) -> Result<(), StorageError> {
        for key in keys::SESSION_KEYS {
            self.remove_value(key).await?;
        }
        Ok(())
    }

    /// Store the applicant identity token (the verification step's job).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn save_identity(&self, applicant: &ApplicantId) -> Result<(), StorageError> {
        self.save_value(keys::IDENTITY, applicant.as_str()).await
    }

    /// Load the applicant identity token, if one was established.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored token is empty.
    async fn load_identity(&self) -> Result<Option<ApplicantId>, StorageError> {
        let Some(token) = self.load_value(keys::IDENTITY).await? else {
            return Ok(None);
        };
        token
            .parse()
            .map(Some)
            .map_err(|err| StorageError::Serialization(format!("invalid identity token: {err}")))
    }
}

/// Simple in-memory store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save_value(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn load_value(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn remove_value(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// Aggregates the session store behind a trait object for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            sessions: Arc::new(InMemorySessionStore::new()),
        }
    }

    /// Open SQLite-backed storage and run migrations.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection or migration fails.
    pub async fn sqlite(database_url: &str) -> Result<Self, crate::sqlite::SqliteInitError> {
        let store = crate::sqlite::SqliteSessionStore::connect(database_url).await?;
        Ok(Self {
            sessions: Arc::new(store),
        })
    }
}
