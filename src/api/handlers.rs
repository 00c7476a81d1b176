//! Request handlers for the HTTP API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::AppState;
use crate::models::agent::Agent;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::credential::{
    EndSummary, JoinCredential, RejoinOutcome, ResolvedBooking, SessionStatusView,
};
use crate::models::session_record::SessionRecord;
use crate::orchestrator::HealthReport;
use crate::Result;

type ApiResult<T> = Result<Json<T>>;

/// Body of `POST /agents`.
#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    /// Display name.
    pub name: String,
    /// Knowledge context handed to the provider.
    #[serde(default)]
    pub knowledge: String,
    /// Join window in hours; defaults when absent.
    pub link_expiry_hours: Option<i64>,
}

/// Body of `POST /bookings`.
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    /// Agent to talk to.
    pub agent_id: String,
    /// Counterpart display name.
    pub counterpart_name: String,
    /// Counterpart email.
    pub counterpart_email: String,
    /// Scheduled start, RFC 3339.
    pub scheduled_at: DateTime<Utc>,
}

/// Body of `PUT /bookings/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// Target status.
    pub status: BookingStatus,
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.orchestrator.health().await)
}

/// `GET /join/{token}` — booking metadata and join state; expired
/// bookings still resolve.
///
/// # Errors
///
/// Returns `AppError::NotFound` for unknown tokens.
pub async fn resolve_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> ApiResult<ResolvedBooking> {
    Ok(Json(state.resolver.resolve(&token).await?))
}

/// `POST /join/{token}/session` — start a session as the token holder.
///
/// # Errors
///
/// Propagates resolver and orchestrator failures.
pub async fn start_for_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<(StatusCode, Json<JoinCredential>)> {
    let resolved = state.resolver.resolve(&token).await?;
    let credential = state.orchestrator.start(&resolved.booking.id).await?;
    Ok((StatusCode::CREATED, Json(credential)))
}

/// `GET /join/{token}/session` — rejoin the active session.
///
/// # Errors
///
/// Returns `AppError::NotFound` for unknown tokens or when no session is
/// active.
pub async fn rejoin_for_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> ApiResult<RejoinOutcome> {
    let resolved = state.resolver.resolve(&token).await?;
    Ok(Json(state.orchestrator.get_active(&resolved.booking.id).await?))
}

/// `POST /join/{token}/session/end` — end the active session as the token
/// holder.
///
/// # Errors
///
/// Returns `AppError::NotFound` for unknown tokens or when no session is
/// active.
pub async fn end_for_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> ApiResult<EndSummary> {
    let resolved = state.resolver.resolve(&token).await?;
    Ok(Json(state.orchestrator.end_for_booking(&resolved.booking.id).await?))
}

/// `POST /agents`
///
/// # Errors
///
/// Returns `AppError::Invalid` for a blank name or bad join window.
pub async fn create_agent(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<Agent>)> {
    let agent = state
        .admin
        .create_agent(body.name, body.knowledge, body.link_expiry_hours)
        .await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

/// `DELETE /agents/{id}`
///
/// # Errors
///
/// Returns `AppError::NotFound` if the agent does not exist.
pub async fn delete_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<StatusCode> {
    state.admin.delete_agent(&agent_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /bookings`
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown agent or
/// `AppError::Invalid` for unusable counterpart details.
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>)> {
    let booking = state
        .admin
        .create_booking(
            &body.agent_id,
            body.counterpart_name,
            body.counterpart_email,
            body.scheduled_at,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// `PUT /bookings/{id}/status`
///
/// # Errors
///
/// Returns `AppError::NotFound` or `AppError::Invalid` for a forbidden
/// transition.
pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> ApiResult<Booking> {
    Ok(Json(state.admin.update_status(&booking_id, body.status).await?))
}

/// `GET /bookings/{id}/sessions`
///
/// # Errors
///
/// Returns `AppError::NotFound` if the booking does not exist.
pub async fn session_history(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> ApiResult<Vec<SessionRecord>> {
    Ok(Json(state.admin.session_history(&booking_id).await?))
}

/// `POST /bookings/{id}/session`
///
/// # Errors
///
/// Propagates orchestrator failures.
pub async fn start_for_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<(StatusCode, Json<JoinCredential>)> {
    let credential = state.orchestrator.start(&booking_id).await?;
    Ok((StatusCode::CREATED, Json(credential)))
}

/// `GET /bookings/{id}/session`
///
/// # Errors
///
/// Returns `AppError::NotFound` when no session is active.
pub async fn rejoin_for_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> ApiResult<RejoinOutcome> {
    Ok(Json(state.orchestrator.get_active(&booking_id).await?))
}

/// `GET /sessions`
///
/// # Errors
///
/// Returns `AppError::Db` if the listing fails.
pub async fn list_active_sessions(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<SessionRecord>> {
    Ok(Json(state.orchestrator.list_active().await?))
}

/// `GET /sessions/{id}/status`
///
/// # Errors
///
/// Returns `AppError::NotFound` or `AppError::Unavailable`.
pub async fn session_status(
    State(state): State<Arc<AppState>>,
    Path(session_record_id): Path<String>,
) -> ApiResult<SessionStatusView> {
    Ok(Json(state.orchestrator.status(&session_record_id).await?))
}

/// `POST /sessions/{id}/end`
///
/// # Errors
///
/// Returns `AppError::NotFound` if the record does not exist.
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(session_record_id): Path<String>,
) -> ApiResult<EndSummary> {
    Ok(Json(state.orchestrator.end(&session_record_id).await?))
}
