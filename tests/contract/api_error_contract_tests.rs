//! JSON shapes the join flow and operator dashboard depend on.

use std::collections::BTreeMap;

use agent_callroom::models::credential::{EndSummary, JoinCredential, SessionStatusView};
use agent_callroom::models::session_record::SessionRecordStatus;
use agent_callroom::orchestrator::{HealthReport, HealthStatus};
use agent_callroom::AppError;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use serde_json::Value;

async fn error_body(err: AppError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).expect("json"))
}

#[tokio::test]
async fn error_body_has_kind_and_message() {
    let (status, body) = error_body(AppError::Gone("join window closed".into())).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "gone");
    assert_eq!(body["message"], "gone: join window closed");
}

#[tokio::test]
async fn conflict_and_gone_are_distinguishable() {
    let (conflict_status, conflict) = error_body(AppError::Conflict("in call".into())).await;
    let (gone_status, gone) = error_body(AppError::Gone("expired".into())).await;
    assert_ne!(conflict_status, gone_status);
    assert_ne!(conflict["error"], gone["error"]);
}

#[tokio::test]
async fn internal_failures_are_generic() {
    for err in [
        AppError::Db("UNIQUE constraint failed: secret_table.col".into()),
        AppError::Internal("agent row missing".into()),
        AppError::Config("bad".into()),
    ] {
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal");
        assert_eq!(body["message"], "internal error");
    }
}

#[test]
fn join_credential_shape() {
    let credential = JoinCredential {
        session_record_id: "s-1".into(),
        remote_session_id: "sess-1".into(),
        room_name: "booking-b1-1".into(),
        participant_token: "tok".into(),
    };
    let json = serde_json::to_value(&credential).expect("serialize");
    let mut keys: Vec<&str> = json
        .as_object()
        .expect("object")
        .keys()
        .map(String::as_str)
        .collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        [
            "participant_token",
            "remote_session_id",
            "room_name",
            "session_record_id"
        ]
    );
}

#[test]
fn status_view_shape() {
    let view = SessionStatusView {
        session_record_id: "s-1".into(),
        local_status: SessionRecordStatus::Active,
        active: false,
        duration_seconds: 10,
        transcript: String::new(),
    };
    let json = serde_json::to_value(&view).expect("serialize");
    assert_eq!(json["local_status"], "active");
    assert_eq!(json["active"], false);
    assert_eq!(json["duration_seconds"], 10);
}

#[test]
fn end_summary_shape() {
    let summary = EndSummary {
        session_record_id: "s-1".into(),
        transcript: "Agent: Bye.".into(),
        duration_seconds: 95,
        ended_at: Utc::now(),
        remote_confirmed: false,
    };
    let json = serde_json::to_value(&summary).expect("serialize");
    assert_eq!(json["transcript"], "Agent: Bye.");
    assert_eq!(json["duration_seconds"], 95);
    assert_eq!(json["remote_confirmed"], false);
    assert!(json["ended_at"].as_str().is_some());
}

#[test]
fn health_report_shape() {
    let report = HealthReport {
        status: HealthStatus::Degraded,
        services: BTreeMap::from([("llm".to_owned(), false)]),
    };
    let json = serde_json::to_value(&report).expect("serialize");
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["services"]["llm"], false);
}
