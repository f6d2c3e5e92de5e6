use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a single exam attempt
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttemptId(Uuid);

impl AttemptId {
    /// Creates a fresh random `AttemptId`
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID
    #[must_use]
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying UUID
    #[must_use]
    pub fn value(&self) -> Uuid {
        self.0
    }
}

/// Opaque token identifying the test-taker, established by a prior
/// verification step.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicantId(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("applicant token cannot be empty")]
pub struct EmptyApplicantToken;

impl ApplicantId {
    /// Creates an `ApplicantId` from a non-empty token.
    ///
    /// # Errors
    ///
    /// Returns `EmptyApplicantToken` if the token is empty or whitespace.
    pub fn new(token: impl Into<String>) -> Result<Self, EmptyApplicantToken> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(EmptyApplicantToken);
        }
        Ok(Self(token))
    }

    /// Returns the token as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ApplicantId {
    type Err = EmptyApplicantToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttemptId({})", self.0)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ApplicantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The token may be sensitive; keep logs to a prefix.
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "ApplicantId({prefix}…)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applicant_token_must_be_non_empty() {
        assert!(ApplicantId::new("  ").is_err());
        assert!(ApplicantId::new("tok-123").is_ok());
    }

    #[test]
    fn attempt_ids_are_unique() {
        assert_ne!(AttemptId::generate(), AttemptId::generate());
    }
}
