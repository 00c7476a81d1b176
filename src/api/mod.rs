//! HTTP API exposing the orchestrator to the join flow and to operators.
//!
//! Capability-token routes (`/join/{token}`) are public: the token is the
//! credential. Agent, booking, and session-id routes are operator routes
//! and require the configured bearer token when one is set.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::GlobalConfig;
use crate::orchestrator::{BookingAdmin, SessionOrchestrator, TokenResolver};
use crate::{AppError, Result};

/// Shared state handed to every request handler.
pub struct AppState {
    /// Loaded configuration, including the operator token.
    pub config: Arc<GlobalConfig>,
    /// Session lifecycle coordinator.
    pub orchestrator: SessionOrchestrator,
    /// Meeting-token resolver.
    pub resolver: TokenResolver,
    /// Agent and booking management.
    pub admin: BookingAdmin,
}

/// Build the API router over `state`.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let operator = Router::new()
        .route("/agents", post(handlers::create_agent))
        .route("/agents/{id}", delete(handlers::delete_agent))
        .route("/bookings", post(handlers::create_booking))
        .route("/bookings/{id}/status", put(handlers::update_booking_status))
        .route("/bookings/{id}/sessions", get(handlers::session_history))
        .route(
            "/bookings/{id}/session",
            post(handlers::start_for_booking).get(handlers::rejoin_for_booking),
        )
        .route("/sessions", get(handlers::list_active_sessions))
        .route("/sessions/{id}/status", get(handlers::session_status))
        .route("/sessions/{id}/end", post(handlers::end_session))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_operator,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/join/{token}", get(handlers::resolve_token))
        .route(
            "/join/{token}/session",
            post(handlers::start_for_token).get(handlers::rejoin_for_token),
        )
        .route("/join/{token}/session/end", post(handlers::end_for_token))
        .merge(operator)
        .with_state(state)
}

/// Bind `config.http_host:http_port` and serve until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails to bind or stops with
/// an error.
pub async fn serve(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let bind = state.config.bind_addr();
    let listener = TcpListener::bind(&bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind HTTP API on {bind}: {err}")))?;
    serve_on(listener, state, ct).await
}

/// Serve the API on an already-bound listener until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the server stops with an error.
pub async fn serve_on(
    listener: TcpListener,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    let addr: Option<SocketAddr> = listener.local_addr().ok();
    info!(?addr, "starting HTTP API");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Config(format!("HTTP API server error: {err}")))?;

    info!("HTTP API shut down");
    Ok(())
}

/// Reject operator requests lacking the configured bearer token.
async fn require_operator(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.operator_token.as_deref() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if presented.is_some_and(|token| constant_time_eq(token.as_bytes(), expected.as_bytes())) {
        next.run(request).await
    } else {
        AppError::Unauthorized("operator token required".into()).into_response()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gone(_) => StatusCode::GONE,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Db(_) | Self::Internal(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let (kind, message) = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(err = %self, "request failed");
            ("internal", "internal error".to_owned())
        } else {
            (self.kind(), self.to_string())
        };

        let body = Json(serde_json::json!({ "error": kind, "message": message }));
        (status, body).into_response()
    }
}
