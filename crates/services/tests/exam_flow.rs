use std::sync::Arc;

use chrono::Duration;

use exam_core::Clock;
use exam_core::model::{ApplicantId, ExamDefinition, IntegrityEvent, QuestionKey};
use exam_core::time::fixed_now;
use services::{
    AppServices, EventOutcome, ExamSessionError, ExamSessionService, SessionEvent,
    StaticSubmission,
};
use storage::repository::{InMemorySessionStore, SessionStore};

fn accepting() -> Arc<StaticSubmission> {
    Arc::new(StaticSubmission::accepting("exam result recorded"))
}

async fn seeded_store() -> Arc<InMemorySessionStore> {
    let store = Arc::new(InMemorySessionStore::new());
    store
        .save_identity(&ApplicantId::new("tok-e2e").unwrap())
        .await
        .unwrap();
    store
}

/// Answer the current question correctly, then advance.
async fn answer_correct_and_next(
    service: &mut ExamSessionService,
) -> Result<EventOutcome, ExamSessionError> {
    let cursor = service.session().cursor();
    let correct = service
        .session()
        .definition()
        .question(cursor.section, cursor.question)
        .unwrap()
        .correct();
    service.apply(SessionEvent::Answer(correct)).await?;
    service.apply(SessionEvent::Next).await
}

#[tokio::test]
async fn missing_identity_is_a_fatal_precondition() {
    let services = AppServices::in_memory(Clock::fixed(fixed_now()), accepting());
    let err = services.start_exam(ExamDefinition::sample()).await.unwrap_err();
    assert!(matches!(err, ExamSessionError::MissingIdentity));
}

#[tokio::test]
async fn full_run_scores_fifteens_and_clears_storage() {
    let store = seeded_store().await;
    let submission = accepting();
    let mut service = ExamSessionService::start_or_resume(
        ExamDefinition::sample(),
        store.clone(),
        submission.clone(),
        Clock::fixed(fixed_now()),
    )
    .await
    .unwrap();

    // 4 sections × 2 questions; the 8th Next triggers submission.
    let mut last = EventOutcome::Continued;
    for _ in 0..8 {
        last = answer_correct_and_next(&mut service).await.unwrap();
    }

    let EventOutcome::Submitted(receipt) = last else {
        panic!("expected submission, got {last:?}");
    };
    assert_eq!(receipt.message, "exam result recorded");
    assert!(service.session().is_complete());
    assert!((service.session().progress_percent() - 100.0).abs() < f64::EPSILON);

    let (applicant, scores) = submission.last_submitted().unwrap();
    assert_eq!(applicant.as_str(), "tok-e2e");
    assert_eq!(
        (scores.arabic, scores.math, scores.english, scores.software),
        (15, 15, 15, 15)
    );

    // All session keys are gone; the identity survives.
    assert!(store.load_session().await.unwrap().is_none());
    assert!(store.load_identity().await.unwrap().is_some());
}

#[tokio::test]
async fn failed_submission_preserves_state_and_allows_retry() {
    let store = seeded_store().await;
    let submission = Arc::new(StaticSubmission::rejecting("scores service unavailable"));
    let mut service = ExamSessionService::start_or_resume(
        ExamDefinition::sample(),
        store.clone(),
        submission.clone(),
        Clock::fixed(fixed_now()),
    )
    .await
    .unwrap();

    let mut last = EventOutcome::Continued;
    for _ in 0..8 {
        last = answer_correct_and_next(&mut service).await.unwrap();
    }
    assert_eq!(
        last,
        EventOutcome::SubmissionFailed("scores service unavailable".to_owned())
    );

    assert!(!service.session().is_complete());
    assert_eq!(service.session().answered_count(), 8);
    assert_eq!(
        service.session().submission_error(),
        Some("scores service unavailable")
    );
    // The snapshot (answers included) is still resident for a retry.
    let resident = store.load_session().await.unwrap().unwrap();
    assert_eq!(resident.answers.len(), 8);

    // Re-triggering Next retries the submission.
    let retry = service.apply(SessionEvent::Next).await.unwrap();
    assert!(matches!(retry, EventOutcome::SubmissionFailed(_)));
    assert_eq!(submission.call_count(), 2);
}

#[tokio::test]
async fn reload_resumes_cursor_answers_and_deadline() {
    let store = seeded_store().await;
    let started = fixed_now();
    let mut service = ExamSessionService::start_or_resume(
        ExamDefinition::sample(),
        store.clone(),
        accepting(),
        Clock::fixed(started),
    )
    .await
    .unwrap();

    service.apply(SessionEvent::Answer(0)).await.unwrap();
    service.apply(SessionEvent::Next).await.unwrap();
    service.apply(SessionEvent::Answer(1)).await.unwrap();
    let cursor = service.session().cursor();
    let attempt = service.session().attempt_id();
    drop(service);

    // "Reload" ten minutes later: same store, later clock.
    let resumed = ExamSessionService::start_or_resume(
        ExamDefinition::sample(),
        store,
        accepting(),
        Clock::fixed(started + Duration::minutes(10)),
    )
    .await
    .unwrap();

    assert_eq!(resumed.session().attempt_id(), attempt);
    assert_eq!(resumed.session().cursor(), cursor);
    assert_eq!(resumed.session().answered_count(), 2);
    // The countdown resumes against the original deadline.
    assert_eq!(resumed.time_remaining(), Duration::minutes(50));
}

#[tokio::test]
async fn integrity_warning_blocks_mutation_until_acknowledged() {
    let store = seeded_store().await;
    let mut service = ExamSessionService::start_or_resume(
        ExamDefinition::sample(),
        store,
        accepting(),
        Clock::fixed(fixed_now()),
    )
    .await
    .unwrap();

    let outcome = service
        .apply(SessionEvent::Platform(IntegrityEvent::FullscreenExited))
        .await
        .unwrap();
    assert!(matches!(outcome, EventOutcome::WarningRaised(_)));

    let err = service.apply(SessionEvent::Answer(0)).await.unwrap_err();
    assert!(matches!(err, ExamSessionError::WarningPending));
    let err = service.apply(SessionEvent::Next).await.unwrap_err();
    assert!(matches!(err, ExamSessionError::WarningPending));

    // Ticks still flow while the warning is pending.
    let tick = service.apply(SessionEvent::Tick).await.unwrap();
    assert_eq!(tick, EventOutcome::Continued);

    let cleared = service.apply(SessionEvent::AcknowledgeWarning).await.unwrap();
    assert_eq!(cleared, EventOutcome::WarningCleared);
    service.apply(SessionEvent::Answer(0)).await.unwrap();
    assert_eq!(service.violation_count(), 1);
}

#[tokio::test]
async fn deadline_expiry_auto_submits_partial_answers() {
    let store = seeded_store().await;
    let submission = accepting();
    let started = fixed_now();
    let mut service = ExamSessionService::start_or_resume(
        ExamDefinition::sample(),
        store.clone(),
        submission.clone(),
        Clock::fixed(started),
    )
    .await
    .unwrap();
    // Answer only the first Arabic question (correctly).
    answer_correct_and_next(&mut service).await.unwrap();
    drop(service);

    // Reload after the hour has passed; the first tick expires the session.
    let mut expired = ExamSessionService::start_or_resume(
        ExamDefinition::sample(),
        store.clone(),
        submission.clone(),
        Clock::fixed(started + Duration::seconds(3601)),
    )
    .await
    .unwrap();
    let outcome = expired.apply(SessionEvent::Tick).await.unwrap();
    assert_eq!(outcome, EventOutcome::Expired { submitted: true });
    assert!(expired.session().is_complete());

    // One of two Arabic questions correct rounds to 8; nothing else scored.
    let (_, scores) = submission.last_submitted().unwrap();
    assert_eq!(
        (scores.arabic, scores.math, scores.english, scores.software),
        (8, 0, 0, 0)
    );
    assert!(store.load_session().await.unwrap().is_none());
}

#[tokio::test]
async fn jump_navigation_moves_the_cursor_directly() {
    let store = seeded_store().await;
    let mut service = ExamSessionService::start_or_resume(
        ExamDefinition::sample(),
        store,
        accepting(),
        Clock::fixed(fixed_now()),
    )
    .await
    .unwrap();

    let moved = service.apply(SessionEvent::JumpToSection(2)).await.unwrap();
    assert_eq!(moved, EventOutcome::Moved(QuestionKey::new(2, 0)));
    let moved = service.apply(SessionEvent::JumpToQuestion(1)).await.unwrap();
    assert_eq!(moved, EventOutcome::Moved(QuestionKey::new(2, 1)));

    let err = service
        .apply(SessionEvent::JumpToSection(9))
        .await
        .unwrap_err();
    assert!(matches!(err, ExamSessionError::Session(_)));
}
