//! Remote conversation provider abstraction.
//!
//! The [`RemoteProvider`] trait isolates the orchestrator from the
//! service that actually hosts real-time conversations. The provider is
//! the only authority on whether a session is live; every answer it gives
//! may be stale, and any call may fail or time out.

pub mod http;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Boxed future returned by [`RemoteProvider`] methods.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Parameters for creating a remote conversation session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreateSessionRequest {
    /// Agent display name.
    pub agent_name: String,
    /// Agent knowledge context.
    pub agent_knowledge: String,
    /// Room name scoped to the booking and a timestamp.
    pub room_name: String,
}

/// A session freshly created by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    /// Provider-assigned session identifier.
    pub remote_session_id: String,
    /// Room the participants connect to.
    pub room_name: String,
    /// Participant join token.
    pub participant_credential: String,
}

/// Liveness snapshot of a remote session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Liveness {
    /// Whether the call is still running.
    pub active: bool,
    /// Elapsed duration in seconds.
    pub duration_seconds: i64,
    /// Most recent transcript excerpt.
    pub partial_transcript: String,
}

/// Fresh participant credential for an existing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejoinCredential {
    /// Participant join token.
    pub participant_credential: String,
    /// Room the participant connects to.
    pub room_name: String,
}

/// Final state captured when a remote session is torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndedSession {
    /// Full transcript.
    pub transcript: String,
    /// Total duration in seconds.
    pub duration_seconds: i64,
}

/// Provider self-reported health.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Whether the provider reports itself fully operational.
    pub ok: bool,
    /// Per-service readiness flags, when reported.
    #[serde(default)]
    pub services: BTreeMap<String, bool>,
}

/// Request/response interface to the remote conversation provider.
///
/// Implementations map transport failures and server errors to
/// [`AppError::Unavailable`](crate::AppError::Unavailable) and unknown
/// sessions to [`AppError::NotFound`](crate::AppError::NotFound).
pub trait RemoteProvider: Send + Sync {
    /// Create a new remote session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unavailable` if the provider cannot create it.
    fn create_session(&self, request: CreateSessionRequest) -> ProviderFuture<'_, CreatedSession>;

    /// Probe the liveness of a remote session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the provider does not know the
    /// session, or `AppError::Unavailable` if it cannot be reached.
    fn probe_liveness(&self, remote_session_id: &str) -> ProviderFuture<'_, Liveness>;

    /// Issue a fresh participant credential for an existing session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` or `AppError::Unavailable` when no
    /// credential can be issued.
    fn issue_rejoin_credential(&self, remote_session_id: &str)
        -> ProviderFuture<'_, RejoinCredential>;

    /// Tear down a remote session, returning its final transcript.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session is already gone, or
    /// `AppError::Unavailable` if the provider cannot be reached.
    fn end_session(&self, remote_session_id: &str) -> ProviderFuture<'_, EndedSession>;

    /// Report provider health.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unavailable` if the provider cannot be reached.
    fn health(&self) -> ProviderFuture<'_, ProviderHealth>;
}
