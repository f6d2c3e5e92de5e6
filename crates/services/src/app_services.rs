use std::sync::Arc;

use tracing::info;

use exam_core::Clock;
use exam_core::model::{ApplicantId, ExamDefinition};
use storage::repository::{SessionStore, Storage};

use crate::error::{AppServicesError, ExamSessionError};
use crate::exam::ExamSessionService;
use crate::submission::SubmissionApi;

/// Assembles the storage backend and submission adapter behind one handle.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    storage: Storage,
    submission: Arc<dyn SubmissionApi>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        submission: Arc<dyn SubmissionApi>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self {
            clock,
            storage,
            submission,
        })
    }

    /// Build services over in-memory storage (tests, offline demo).
    #[must_use]
    pub fn in_memory(clock: Clock, submission: Arc<dyn SubmissionApi>) -> Self {
        Self {
            clock,
            storage: Storage::in_memory(),
            submission,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.storage.sessions)
    }

    /// Establishes the applicant identity, standing in for the external
    /// verification step that normally writes this token.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the token is empty or cannot be stored.
    pub async fn verify_applicant(&self, token: &str) -> Result<ApplicantId, AppServicesError> {
        let applicant = ApplicantId::new(token)?;
        self.storage.sessions.save_identity(&applicant).await?;
        info!("applicant identity established");
        Ok(applicant)
    }

    /// Starts or resumes the exam session for the given content.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::MissingIdentity` if no identity token was
    /// established, plus session/storage errors.
    pub async fn start_exam(
        &self,
        definition: ExamDefinition,
    ) -> Result<ExamSessionService, ExamSessionError> {
        ExamSessionService::start_or_resume(
            definition,
            self.sessions(),
            Arc::clone(&self.submission),
            self.clock,
        )
        .await
    }
}
