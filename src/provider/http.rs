//! HTTP/JSON implementation of [`RemoteProvider`].
//!
//! Every request carries the client-level timeouts from
//! [`ProviderConfig`]; a timed-out call surfaces as
//! `AppError::Unavailable` like any other transport failure.

use std::collections::BTreeMap;

use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{
    CreateSessionRequest, CreatedSession, EndedSession, Liveness, ProviderFuture, ProviderHealth,
    RejoinCredential, RemoteProvider,
};
use crate::config::ProviderConfig;
use crate::{AppError, Result};

#[derive(Debug, Deserialize)]
struct StartSessionResponse {
    room_name: String,
    participant_token: String,
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct SessionStatusResponse {
    active: bool,
    #[serde(default)]
    duration_seconds: i64,
    #[serde(default)]
    partial_transcript: String,
}

#[derive(Debug, Deserialize)]
struct RejoinTokenResponse {
    participant_token: String,
    room_name: String,
}

#[derive(Debug, Deserialize)]
struct EndSessionResponse {
    success: bool,
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    duration: i64,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    services: BTreeMap<String, bool>,
}

/// Provider client speaking the conversation service's REST API.
#[derive(Clone)]
pub struct HttpProvider {
    base_url: Url,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpProvider {
    /// Build a client from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the base URL is invalid or the HTTP
    /// client cannot be constructed.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| AppError::Config(format!("invalid provider.base_url: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(
                "provider.base_url cannot be used as a base URL".into(),
            ));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .build()
            .map_err(|err| AppError::Config(format!("failed to build provider client: {err}")))?;

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            http,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AppError::Config("provider.base_url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        let mut request = self.http.request(method, url);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        Ok(request)
    }
}

/// Send a request and decode a JSON success body.
async fn send_json<T: DeserializeOwned>(request: RequestBuilder, operation: &str) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    debug!(operation, %status, "provider response");

    if status == StatusCode::NOT_FOUND {
        return Err(AppError::NotFound(format!(
            "provider has no such session ({operation})"
        )));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Unavailable(format!(
            "provider returned HTTP {status} for {operation}: {body}"
        )));
    }

    response.json::<T>().await.map_err(|err| {
        AppError::Unavailable(format!("undecodable provider response for {operation}: {err}"))
    })
}

impl RemoteProvider for HttpProvider {
    fn create_session(&self, request: CreateSessionRequest) -> ProviderFuture<'_, CreatedSession> {
        Box::pin(async move {
            let builder = self.request(Method::POST, &["sessions", "start"])?.json(&request);
            let body: StartSessionResponse = send_json(builder, "create_session").await?;
            Ok(CreatedSession {
                remote_session_id: body.session_id,
                room_name: body.room_name,
                participant_credential: body.participant_token,
            })
        })
    }

    fn probe_liveness(&self, remote_session_id: &str) -> ProviderFuture<'_, Liveness> {
        let id = remote_session_id.to_owned();
        Box::pin(async move {
            let builder = self.request(Method::GET, &["sessions", id.as_str(), "status"])?;
            let body: SessionStatusResponse = send_json(builder, "probe_liveness").await?;
            Ok(Liveness {
                active: body.active,
                duration_seconds: body.duration_seconds,
                partial_transcript: body.partial_transcript,
            })
        })
    }

    fn issue_rejoin_credential(
        &self,
        remote_session_id: &str,
    ) -> ProviderFuture<'_, RejoinCredential> {
        let id = remote_session_id.to_owned();
        Box::pin(async move {
            let builder = self.request(Method::GET, &["sessions", id.as_str(), "rejoin-token"])?;
            let body: RejoinTokenResponse = send_json(builder, "issue_rejoin_credential").await?;
            Ok(RejoinCredential {
                participant_credential: body.participant_token,
                room_name: body.room_name,
            })
        })
    }

    fn end_session(&self, remote_session_id: &str) -> ProviderFuture<'_, EndedSession> {
        let id = remote_session_id.to_owned();
        Box::pin(async move {
            let builder = self.request(Method::POST, &["sessions", id.as_str(), "end"])?;
            let body: EndSessionResponse = send_json(builder, "end_session").await?;
            if !body.success {
                return Err(AppError::Unavailable(
                    "provider reported an unsuccessful end".into(),
                ));
            }
            Ok(EndedSession {
                transcript: body.transcript,
                duration_seconds: body.duration,
            })
        })
    }

    fn health(&self) -> ProviderFuture<'_, ProviderHealth> {
        Box::pin(async move {
            let builder = self.request(Method::GET, &["health"])?;
            let body: HealthResponse = send_json(builder, "health").await?;
            Ok(ProviderHealth {
                ok: body.status == "ok",
                services: body.services,
            })
        })
    }
}
