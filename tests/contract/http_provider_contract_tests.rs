//! Wire contract between `HttpProvider` and the conversation service.
//!
//! A stand-in service is served in-process on an ephemeral port; it
//! records what it receives and answers with the service's JSON shapes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_callroom::config::ProviderConfig;
use agent_callroom::provider::http::HttpProvider;
use agent_callroom::provider::{CreateSessionRequest, RemoteProvider};
use agent_callroom::AppError;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Seen {
    start_body: Option<Value>,
    authorization: Option<String>,
}

type Shared = Arc<Mutex<Seen>>;

async fn start(State(seen): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let mut seen = seen.lock().unwrap();
    seen.authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let room = body["room_name"].as_str().unwrap_or_default().to_owned();
    seen.start_body = Some(body);
    Json(json!({
        "room_name": room,
        "participant_token": "lk-participant-token",
        "session_id": "sess-1",
    }))
}

async fn status(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    match id.as_str() {
        "sess-1" => Ok(Json(json!({
            "active": true,
            "duration_seconds": 61,
            "partial_transcript": "Agent: Hello.",
        }))),
        "sess-broken" => Err(StatusCode::INTERNAL_SERVER_ERROR),
        "sess-garbled" => Ok(Json(json!({ "unexpected": true }))),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn rejoin(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    if id == "sess-1" {
        Ok(Json(json!({
            "participant_token": "lk-rejoin-token",
            "room_name": "booking-b1-1700000000000",
        })))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

async fn end(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    match id.as_str() {
        "sess-1" => Ok(Json(json!({
            "success": true,
            "transcript": "Agent: Hello.\nUser: Bye.",
            "duration": 95,
        }))),
        "sess-refused" => Ok(Json(json!({ "success": false }))),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "services": { "livekit": true, "stt": true, "llm": true, "tts": true },
    }))
}

async fn slow_health() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "status": "ok" }))
}

/// Serve `app` on an ephemeral port and return its base URL.
async fn serve(app: Router) -> (String, CancellationToken) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_ct.cancelled().await })
            .await;
    });
    (format!("http://{addr}"), ct)
}

async fn stand_in() -> (HttpProvider, Shared, CancellationToken) {
    let seen = Shared::default();
    let app = Router::new()
        .route("/sessions/start", post(start))
        .route("/sessions/{id}/status", get(status))
        .route("/sessions/{id}/rejoin-token", get(rejoin))
        .route("/sessions/{id}/end", post(end))
        .route("/health", get(health))
        .with_state(Arc::clone(&seen));
    let (base_url, ct) = serve(app).await;
    (provider_for(&base_url, None), seen, ct)
}

fn provider_for(base_url: &str, api_key: Option<&str>) -> HttpProvider {
    let config = ProviderConfig {
        base_url: base_url.to_owned(),
        timeout_seconds: 1,
        connect_timeout_seconds: 1,
        api_key: api_key.map(str::to_owned),
    };
    HttpProvider::new(&config).expect("provider")
}

fn create_request() -> CreateSessionRequest {
    CreateSessionRequest {
        agent_name: "Ava".into(),
        agent_knowledge: "Ava helps visitors plan trips.".into(),
        room_name: "booking-b1-1700000000000".into(),
    }
}

// ── create_session ──────────────────────────────────

#[tokio::test]
async fn create_session_sends_agent_context_and_maps_response() {
    let (provider, seen, ct) = stand_in().await;

    let created = provider
        .create_session(create_request())
        .await
        .expect("create");
    assert_eq!(created.remote_session_id, "sess-1");
    assert_eq!(created.room_name, "booking-b1-1700000000000");
    assert_eq!(created.participant_credential, "lk-participant-token");

    let body = seen.lock().unwrap().start_body.clone().expect("body");
    assert_eq!(body["agent_name"], "Ava");
    assert_eq!(body["agent_knowledge"], "Ava helps visitors plan trips.");
    assert_eq!(body["room_name"], "booking-b1-1700000000000");
    ct.cancel();
}

#[tokio::test]
async fn api_key_is_sent_as_bearer() {
    let seen = Shared::default();
    let app = Router::new()
        .route("/sessions/start", post(start))
        .with_state(Arc::clone(&seen));
    let (base_url, ct) = serve(app).await;
    let provider = provider_for(&base_url, Some("provider-key"));

    provider
        .create_session(create_request())
        .await
        .expect("create");
    assert_eq!(
        seen.lock().unwrap().authorization.as_deref(),
        Some("Bearer provider-key")
    );
    ct.cancel();
}

#[tokio::test]
async fn base_url_path_prefix_is_preserved() {
    let seen = Shared::default();
    let app = Router::new()
        .route("/voice/sessions/start", post(start))
        .with_state(Arc::clone(&seen));
    let (base_url, ct) = serve(app).await;
    let provider = provider_for(&format!("{base_url}/voice"), None);

    let created = provider
        .create_session(create_request())
        .await
        .expect("create under prefix");
    assert_eq!(created.remote_session_id, "sess-1");
    ct.cancel();
}

// ── probe_liveness ──────────────────────────────────

#[tokio::test]
async fn probe_liveness_maps_status_fields() {
    let (provider, _, ct) = stand_in().await;
    let liveness = provider.probe_liveness("sess-1").await.expect("probe");
    assert!(liveness.active);
    assert_eq!(liveness.duration_seconds, 61);
    assert_eq!(liveness.partial_transcript, "Agent: Hello.");
    ct.cancel();
}

#[tokio::test]
async fn probe_of_unknown_session_is_not_found() {
    let (provider, _, ct) = stand_in().await;
    let result = provider.probe_liveness("sess-unknown").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    ct.cancel();
}

#[tokio::test]
async fn server_error_is_unavailable() {
    let (provider, _, ct) = stand_in().await;
    let result = provider.probe_liveness("sess-broken").await;
    assert!(matches!(result, Err(AppError::Unavailable(_))));
    ct.cancel();
}

#[tokio::test]
async fn undecodable_body_is_unavailable() {
    let (provider, _, ct) = stand_in().await;
    let result = provider.probe_liveness("sess-garbled").await;
    assert!(matches!(result, Err(AppError::Unavailable(_))));
    ct.cancel();
}

// ── issue_rejoin_credential ─────────────────────────

#[tokio::test]
async fn rejoin_maps_fresh_token() {
    let (provider, _, ct) = stand_in().await;
    let credential = provider
        .issue_rejoin_credential("sess-1")
        .await
        .expect("rejoin");
    assert_eq!(credential.participant_credential, "lk-rejoin-token");
    assert_eq!(credential.room_name, "booking-b1-1700000000000");

    let missing = provider.issue_rejoin_credential("sess-gone").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
    ct.cancel();
}

// ── end_session ─────────────────────────────────────

#[tokio::test]
async fn end_maps_transcript_and_duration() {
    let (provider, _, ct) = stand_in().await;
    let ended = provider.end_session("sess-1").await.expect("end");
    assert_eq!(ended.transcript, "Agent: Hello.\nUser: Bye.");
    assert_eq!(ended.duration_seconds, 95);
    ct.cancel();
}

#[tokio::test]
async fn unsuccessful_end_is_unavailable() {
    let (provider, _, ct) = stand_in().await;
    let result = provider.end_session("sess-refused").await;
    assert!(matches!(result, Err(AppError::Unavailable(_))));
    ct.cancel();
}

// ── health ──────────────────────────────────────────

#[tokio::test]
async fn health_maps_status_and_services() {
    let (provider, _, ct) = stand_in().await;
    let health = provider.health().await.expect("health");
    assert!(health.ok);
    assert_eq!(health.services.len(), 4);
    assert_eq!(health.services.get("tts"), Some(&true));
    ct.cancel();
}

#[tokio::test]
async fn slow_provider_times_out_as_unavailable() {
    let app = Router::new().route("/health", get(slow_health));
    let (base_url, ct) = serve(app).await;
    let provider = provider_for(&base_url, None);

    let result = provider.health().await;
    assert!(matches!(result, Err(AppError::Unavailable(_))));
    ct.cancel();
}

#[tokio::test]
async fn unreachable_provider_is_unavailable() {
    // Bind then drop to obtain a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let provider = provider_for(&format!("http://{addr}"), None);
    let result = provider.probe_liveness("sess-1").await;
    assert!(matches!(result, Err(AppError::Unavailable(_))));
}

#[test]
fn invalid_base_url_is_config_error() {
    let config = ProviderConfig {
        base_url: "not a url".into(),
        timeout_seconds: 1,
        connect_timeout_seconds: 1,
        api_key: None,
    };
    assert!(matches!(
        HttpProvider::new(&config),
        Err(AppError::Config(_))
    ));
}

#[test]
fn debug_output_redacts_api_key() {
    let provider = provider_for("http://127.0.0.1:8000", Some("super-secret"));
    let rendered = format!("{provider:?}");
    assert!(!rendered.contains("super-secret"));
    assert!(rendered.contains("REDACTED"));
}
