use chrono::Duration;
use exam_core::model::{ApplicantId, ExamDefinition, ExamSession};
use exam_core::time::fixed_now;
use storage::repository::SessionStore;
use storage::sqlite::SqliteSessionStore;

async fn memory_store() -> SqliteSessionStore {
    SqliteSessionStore::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite should connect")
}

fn mid_exam_session() -> ExamSession {
    let mut session = ExamSession::new(
        ExamDefinition::sample(),
        ApplicantId::new("tok-7").unwrap(),
        fixed_now(),
        Duration::seconds(3600),
    );
    session.answer(0).unwrap();
    session.next().unwrap();
    session.next().unwrap();
    session.answer(1).unwrap();
    session
}

#[tokio::test]
async fn sqlite_round_trips_a_session_snapshot() {
    let store = memory_store().await;
    let session = mid_exam_session();
    store.save_session(&session.snapshot()).await.unwrap();

    let loaded = store.load_session().await.unwrap().unwrap();
    assert_eq!(loaded, session.snapshot());

    let restored = ExamSession::from_snapshot(ExamDefinition::sample(), loaded).unwrap();
    assert_eq!(restored.cursor(), session.cursor());
    assert_eq!(restored.answers(), session.answers());
    assert_eq!(restored.deadline(), session.deadline());
}

#[tokio::test]
async fn sqlite_save_is_an_upsert() {
    let store = memory_store().await;
    let mut session = mid_exam_session();
    store.save_session(&session.snapshot()).await.unwrap();

    session.answer(2).unwrap();
    store.save_session(&session.snapshot()).await.unwrap();

    let loaded = store.load_session().await.unwrap().unwrap();
    assert_eq!(loaded.answers.len(), session.answers().len());
}

#[tokio::test]
async fn sqlite_clear_session_keeps_identity() {
    let store = memory_store().await;
    let applicant = ApplicantId::new("tok-7").unwrap();
    store.save_identity(&applicant).await.unwrap();
    store.save_session(&mid_exam_session().snapshot()).await.unwrap();

    store.clear_session().await.unwrap();
    assert!(store.load_session().await.unwrap().is_none());
    assert_eq!(store.load_identity().await.unwrap(), Some(applicant));
}
