//! Integration tests for `SessionOrchestrator::end`.

use agent_callroom::models::booking::BookingStatus;
use agent_callroom::models::session_record::SessionRecordStatus;
use agent_callroom::AppError;

use super::test_helpers::harness;

#[tokio::test]
async fn end_uses_remote_transcript_and_completes_booking() {
    let h = harness().await;
    let booking = h.open_booking().await;
    let started = h.orchestrator.start(&booking.id).await.expect("start");
    h.provider.set_progress(
        &started.remote_session_id,
        180,
        "Agent: Hello.\nDana: Hi, I'd like to plan a trip.",
    );

    let summary = h
        .orchestrator
        .end(&started.session_record_id)
        .await
        .expect("end");
    assert!(summary.remote_confirmed);
    assert_eq!(summary.duration_seconds, 180);
    assert!(summary.transcript.contains("plan a trip"));

    let record = h
        .records
        .get_by_id(&started.session_record_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(record.status, SessionRecordStatus::Completed);
    assert_eq!(record.duration_seconds, 180);
    assert!(record.ended_at.is_some());

    let stored = h
        .bookings
        .get_by_id(&booking.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(stored.status, BookingStatus::Completed);
    assert_eq!(h.provider.live_sessions(), 0);
}

#[tokio::test]
async fn end_with_provider_down_uses_local_state() {
    let h = harness().await;
    let booking = h.open_booking().await;
    let started = h.orchestrator.start(&booking.id).await.expect("start");
    h.provider
        .set_progress(&started.remote_session_id, 60, "Agent: Welcome.");
    h.orchestrator
        .status(&started.session_record_id)
        .await
        .expect("status");

    h.provider.set_unreachable(true);
    let summary = h
        .orchestrator
        .end(&started.session_record_id)
        .await
        .expect("end never fails on provider errors");
    assert!(!summary.remote_confirmed);
    assert_eq!(summary.duration_seconds, 60);
    assert_eq!(summary.transcript, "Agent: Welcome.");

    let record = h
        .records
        .get_by_id(&started.session_record_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(record.status, SessionRecordStatus::Completed);
    let stored = h
        .bookings
        .get_by_id(&booking.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(stored.status, BookingStatus::Completed);
}

#[tokio::test]
async fn end_with_no_captured_transcript_stores_empty() {
    let h = harness().await;
    let booking = h.open_booking().await;
    let started = h.orchestrator.start(&booking.id).await.expect("start");
    h.provider.forget(&started.remote_session_id);

    let summary = h
        .orchestrator
        .end(&started.session_record_id)
        .await
        .expect("end");
    assert!(!summary.remote_confirmed);
    assert_eq!(summary.transcript, "");
    assert_eq!(summary.duration_seconds, 0);
}

#[tokio::test]
async fn end_timeout_still_completes() {
    let h = harness().await;
    let booking = h.open_booking().await;
    let started = h.orchestrator.start(&booking.id).await.expect("start");
    h.provider.set_hanging(true);

    let summary = h
        .orchestrator
        .end(&started.session_record_id)
        .await
        .expect("end");
    assert!(!summary.remote_confirmed);
    assert!(h
        .records
        .find_active_for_booking(&booking.id)
        .await
        .expect("query")
        .is_none());
}

#[tokio::test]
async fn end_is_idempotent_and_preserves_outcome() {
    let h = harness().await;
    let booking = h.open_booking().await;
    let started = h.orchestrator.start(&booking.id).await.expect("start");
    h.provider
        .set_progress(&started.remote_session_id, 90, "Agent: Goodbye.");

    let first = h
        .orchestrator
        .end(&started.session_record_id)
        .await
        .expect("first end");
    let second = h
        .orchestrator
        .end(&started.session_record_id)
        .await
        .expect("second end");

    assert_eq!(second.transcript, first.transcript);
    assert_eq!(second.duration_seconds, first.duration_seconds);
    assert_eq!(
        second.ended_at.timestamp(),
        first.ended_at.timestamp()
    );
    // The provider is only asked once.
    assert_eq!(h.provider.end_calls(), 1);
}

#[tokio::test]
async fn end_of_unknown_record_is_not_found() {
    let h = harness().await;
    let result = h.orchestrator.end("missing").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn concurrent_ends_agree_on_outcome() {
    let h = harness().await;
    let booking = h.open_booking().await;
    let started = h.orchestrator.start(&booking.id).await.expect("start");
    h.provider
        .set_progress(&started.remote_session_id, 33, "Agent: Bye.");
    // Whichever end reaches the provider second falls back to local state.
    h.orchestrator
        .status(&started.session_record_id)
        .await
        .expect("status");

    let (a, b) = tokio::join!(
        h.orchestrator.end(&started.session_record_id),
        h.orchestrator.end(&started.session_record_id)
    );
    let a = a.expect("end a");
    let b = b.expect("end b");

    let record = h
        .records
        .get_by_id(&started.session_record_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(record.status, SessionRecordStatus::Completed);
    assert_eq!(record.transcript.as_deref(), Some("Agent: Bye."));
    assert_eq!(a.transcript, "Agent: Bye.");
    assert_eq!(b.transcript, "Agent: Bye.");
}

#[tokio::test]
async fn failed_booking_update_leaves_record_active_for_retry() {
    let h = harness().await;
    let booking = h.open_booking().await;
    let started = h.orchestrator.start(&booking.id).await.expect("start");
    h.provider
        .set_progress(&started.remote_session_id, 21, "Agent: One moment.");
    h.orchestrator
        .status(&started.session_record_id)
        .await
        .expect("status");

    sqlx::query(
        "CREATE TRIGGER freeze_bookings BEFORE UPDATE ON bookings
         BEGIN SELECT RAISE(ABORT, 'bookings are read-only'); END",
    )
    .execute(h.db.as_ref())
    .await
    .expect("install trigger");

    let failed = h.orchestrator.end(&started.session_record_id).await;
    assert!(matches!(failed, Err(AppError::Db(_))));
    let record = h
        .records
        .get_by_id(&started.session_record_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(record.status, SessionRecordStatus::Active);
    assert!(record.ended_at.is_none());

    sqlx::query("DROP TRIGGER freeze_bookings")
        .execute(h.db.as_ref())
        .await
        .expect("drop trigger");

    let summary = h
        .orchestrator
        .end(&started.session_record_id)
        .await
        .expect("retry end");
    assert_eq!(summary.transcript, "Agent: One moment.");
    let stored = h
        .bookings
        .get_by_id(&booking.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(stored.status, BookingStatus::Completed);
}

#[tokio::test]
async fn end_for_booking_ends_its_active_session() {
    let h = harness().await;
    let booking = h.open_booking().await;
    assert!(matches!(
        h.orchestrator.end_for_booking(&booking.id).await,
        Err(AppError::NotFound(_))
    ));

    let started = h.orchestrator.start(&booking.id).await.expect("start");
    let summary = h
        .orchestrator
        .end_for_booking(&booking.id)
        .await
        .expect("end");
    assert_eq!(summary.session_record_id, started.session_record_id);
    assert!(summary.remote_confirmed);
    assert!(matches!(
        h.orchestrator.end_for_booking(&booking.id).await,
        Err(AppError::NotFound(_))
    ));
}
