//! Integration tests for `SessionOrchestrator::status`, `health`, and
//! `list_active`.

use agent_callroom::models::session_record::SessionRecordStatus;
use agent_callroom::orchestrator::HealthStatus;
use agent_callroom::AppError;

use super::test_helpers::harness;

#[tokio::test]
async fn status_reports_remote_liveness_and_progress() {
    let h = harness().await;
    let booking = h.open_booking().await;
    let started = h.orchestrator.start(&booking.id).await.expect("start");
    h.provider
        .set_progress(&started.remote_session_id, 42, "Agent: Hello Dana.");

    let view = h
        .orchestrator
        .status(&started.session_record_id)
        .await
        .expect("status");
    assert!(view.active);
    assert_eq!(view.local_status, SessionRecordStatus::Active);
    assert_eq!(view.duration_seconds, 42);
    assert_eq!(view.transcript, "Agent: Hello Dana.");
}

#[tokio::test]
async fn status_stores_last_known_progress() {
    let h = harness().await;
    let booking = h.open_booking().await;
    let started = h.orchestrator.start(&booking.id).await.expect("start");
    h.provider
        .set_progress(&started.remote_session_id, 17, "Agent: Hi.");
    h.orchestrator
        .status(&started.session_record_id)
        .await
        .expect("status");

    // An empty partial transcript does not erase the stored one.
    h.provider.set_progress(&started.remote_session_id, 25, "");
    h.orchestrator
        .status(&started.session_record_id)
        .await
        .expect("status");

    let record = h
        .records
        .get_by_id(&started.session_record_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(record.duration_seconds, 25);
    assert_eq!(record.transcript.as_deref(), Some("Agent: Hi."));
}

#[tokio::test]
async fn status_exposes_drift_between_local_and_remote() {
    let h = harness().await;
    let booking = h.open_booking().await;
    let started = h.orchestrator.start(&booking.id).await.expect("start");
    h.provider.deactivate(&started.remote_session_id);

    let view = h
        .orchestrator
        .status(&started.session_record_id)
        .await
        .expect("status");
    assert!(!view.active);
    assert_eq!(view.local_status, SessionRecordStatus::Active);
}

#[tokio::test]
async fn status_of_unknown_record_is_not_found() {
    let h = harness().await;
    let result = h.orchestrator.status("missing").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(h.provider.probe_calls(), 0);
}

#[tokio::test]
async fn status_while_provider_down_is_unavailable() {
    let h = harness().await;
    let booking = h.open_booking().await;
    let started = h.orchestrator.start(&booking.id).await.expect("start");
    h.provider.set_unreachable(true);

    let result = h.orchestrator.status(&started.session_record_id).await;
    assert!(matches!(result, Err(AppError::Unavailable(_))));
}

#[tokio::test]
async fn status_of_vanished_remote_session_is_unavailable() {
    let h = harness().await;
    let booking = h.open_booking().await;
    let started = h.orchestrator.start(&booking.id).await.expect("start");
    h.provider.forget(&started.remote_session_id);

    let result = h.orchestrator.status(&started.session_record_id).await;
    assert!(matches!(result, Err(AppError::Unavailable(_))));
}

#[tokio::test]
async fn status_timeout_is_unavailable() {
    let h = harness().await;
    let booking = h.open_booking().await;
    let started = h.orchestrator.start(&booking.id).await.expect("start");
    h.provider.set_hanging(true);

    let result = h.orchestrator.status(&started.session_record_id).await;
    assert!(matches!(result, Err(AppError::Unavailable(_))));
}

// ── Health ──────────────────────────────────────────

#[tokio::test]
async fn health_ok_when_provider_ok() {
    let h = harness().await;
    let report = h.orchestrator.health().await;
    assert_eq!(report.status, HealthStatus::Ok);
    assert_eq!(report.services.get("livekit"), Some(&true));
}

#[tokio::test]
async fn health_degraded_when_provider_reports_degraded() {
    let h = harness().await;
    h.provider.set_degraded(true);
    let report = h.orchestrator.health().await;
    assert_eq!(report.status, HealthStatus::Degraded);
    assert_eq!(report.services.get("llm"), Some(&false));
}

#[tokio::test]
async fn health_degraded_when_provider_unreachable() {
    let h = harness().await;
    h.provider.set_unreachable(true);
    let report = h.orchestrator.health().await;
    assert_eq!(report.status, HealthStatus::Degraded);
    assert!(report.services.is_empty());
}

#[tokio::test]
async fn health_degraded_when_provider_hangs() {
    let h = harness().await;
    h.provider.set_hanging(true);
    let report = h.orchestrator.health().await;
    assert_eq!(report.status, HealthStatus::Degraded);
}

// ── Listing ─────────────────────────────────────────

#[tokio::test]
async fn list_active_tracks_started_and_ended_sessions() {
    let h = harness().await;
    let first = h.open_booking().await;
    let second = h.open_booking().await;
    let a = h.orchestrator.start(&first.id).await.expect("start a");
    h.orchestrator.start(&second.id).await.expect("start b");
    assert_eq!(h.orchestrator.list_active().await.expect("list").len(), 2);

    h.orchestrator.end(&a.session_record_id).await.expect("end");
    let active = h.orchestrator.list_active().await.expect("list");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].booking_id, second.id);
}
