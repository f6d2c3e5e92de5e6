use std::env;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use exam_core::model::ApplicantId;
use exam_core::scoring::SubjectScores;

use crate::error::SubmissionError;

/// Acknowledgement returned by the submission endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub message: String,
}

/// Port for the remote service accepting final per-subject scores.
///
/// Failures must be surfaced verbatim to the user and never clear persisted
/// session state; the controller owns that contract.
#[async_trait]
pub trait SubmissionApi: Send + Sync {
    /// Submit the four subject scores for the given applicant.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError` when the endpoint rejects the submission or
    /// the request fails.
    async fn submit(
        &self,
        applicant: &ApplicantId,
        scores: &SubjectScores,
    ) -> Result<SubmissionReceipt, SubmissionError>;
}

//
// ─── HTTP ADAPTER ──────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct SubmissionConfig {
    pub base_url: Url,
}

impl SubmissionConfig {
    /// Reads `EXAM_API_BASE_URL`; `None` if unset or not a valid URL.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let raw = env::var("EXAM_API_BASE_URL").ok()?;
        let base_url = Url::parse(raw.trim()).ok()?;
        Some(Self { base_url })
    }
}

/// `reqwest`-backed submission adapter posting JSON to the admissions API.
#[derive(Clone)]
pub struct HttpSubmissionService {
    client: Client,
    config: SubmissionConfig,
}

#[derive(Debug, Serialize)]
struct ExamResultRequest<'a> {
    identity: &'a str,
    arabic: u8,
    math: u8,
    english: u8,
    software: u8,
}

#[derive(Debug, Deserialize)]
struct ExamResultResponse {
    message: Option<String>,
}

impl HttpSubmissionService {
    #[must_use]
    pub fn new(config: SubmissionConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/applicants/exam-result",
            self.config.base_url.as_str().trim_end_matches('/')
        )
    }
}

#[async_trait]
impl SubmissionApi for HttpSubmissionService {
    async fn submit(
        &self,
        applicant: &ApplicantId,
        scores: &SubjectScores,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let payload = ExamResultRequest {
            identity: applicant.as_str(),
            arabic: scores.arabic,
            math: scores.math,
            english: scores.english,
            software: scores.software,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Prefer the server's own message so it reaches the user verbatim.
            let body: Option<ExamResultResponse> = response.json().await.ok();
            return match body.and_then(|b| b.message) {
                Some(message) => Err(SubmissionError::Rejected(message)),
                None => Err(SubmissionError::HttpStatus(status)),
            };
        }

        let body: ExamResultResponse = response.json().await?;
        Ok(SubmissionReceipt {
            message: body
                .message
                .unwrap_or_else(|| "exam result recorded".to_owned()),
        })
    }
}

//
// ─── STATIC ADAPTER ────────────────────────────────────────────────────────────
//

/// Canned submission adapter for tests and the offline demo: always accepts
/// or always rejects, and records what it was last asked to submit.
pub struct StaticSubmission {
    accept_message: String,
    reject_with: Option<String>,
    last: Mutex<Option<(ApplicantId, SubjectScores)>>,
    calls: Mutex<u32>,
}

impl StaticSubmission {
    /// An adapter that accepts every submission with the given message.
    #[must_use]
    pub fn accepting(message: impl Into<String>) -> Self {
        Self {
            accept_message: message.into(),
            reject_with: None,
            last: Mutex::new(None),
            calls: Mutex::new(0),
        }
    }

    /// An adapter that rejects every submission with the given message.
    #[must_use]
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            accept_message: String::new(),
            reject_with: Some(message.into()),
            last: Mutex::new(None),
            calls: Mutex::new(0),
        }
    }

    /// The most recent submission payload, if any.
    #[must_use]
    pub fn last_submitted(&self) -> Option<(ApplicantId, SubjectScores)> {
        self.last.lock().map(|guard| guard.clone()).unwrap_or(None)
    }

    /// How many submissions were attempted.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.lock().map(|guard| *guard).unwrap_or(0)
    }
}

#[async_trait]
impl SubmissionApi for StaticSubmission {
    async fn submit(
        &self,
        applicant: &ApplicantId,
        scores: &SubjectScores,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        if let Ok(mut last) = self.last.lock() {
            *last = Some((applicant.clone(), *scores));
        }

        match &self.reject_with {
            Some(message) => Err(SubmissionError::Rejected(message.clone())),
            None => Ok(SubmissionReceipt {
                message: self.accept_message.clone(),
            }),
        }
    }
}
