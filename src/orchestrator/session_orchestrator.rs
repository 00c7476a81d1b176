//! Voice session lifecycle: start, rejoin, status, end.
//!
//! Two stores of truth meet here. The local session record is durable and
//! authoritative for history; the remote provider is ephemeral and
//! authoritative for liveness. Every operation reconciles on read: the
//! local record is never treated as a fresh cache of the remote state.
//!
//! No lock is held across a provider call. The at-most-one-active-session
//! invariant is enforced by the liveness probe and, for the persist step,
//! by the store's partial unique index.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument, Span};

use crate::models::agent::Agent;
use crate::models::booking::Booking;
use crate::models::credential::{EndSummary, JoinCredential, RejoinOutcome, SessionStatusView};
use crate::models::session_record::{Participants, SessionRecord};
use crate::persistence::agent_repo::AgentRepo;
use crate::persistence::booking_repo::{booking_status_str, BookingRepo};
use crate::persistence::db::Database;
use crate::persistence::session_record_repo::SessionRecordRepo;
use crate::provider::{CreateSessionRequest, ProviderFuture, RemoteProvider};
use crate::{AppError, Result};

/// Overall health as seen by dashboards.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Provider reachable and fully operational.
    Ok,
    /// Provider unreachable or reporting a degraded service.
    Degraded,
}

/// Health passthrough result.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthReport {
    /// Aggregate status.
    pub status: HealthStatus,
    /// Per-service flags reported by the provider, if it answered.
    pub services: BTreeMap<String, bool>,
}

/// Coordinates booking records, session records, and the remote provider.
///
/// Stateless apart from its handles; cheap to clone and safe to share.
#[derive(Clone)]
pub struct SessionOrchestrator {
    bookings: BookingRepo,
    agents: AgentRepo,
    records: SessionRecordRepo,
    provider: Arc<dyn RemoteProvider>,
    call_timeout: Duration,
}

impl SessionOrchestrator {
    /// Create an orchestrator over `db`, bounding every provider call by
    /// `call_timeout`.
    #[must_use]
    pub fn new(db: Arc<Database>, provider: Arc<dyn RemoteProvider>, call_timeout: Duration) -> Self {
        Self {
            bookings: BookingRepo::new(Arc::clone(&db)),
            agents: AgentRepo::new(Arc::clone(&db)),
            records: SessionRecordRepo::new(db),
            provider,
            call_timeout,
        }
    }

    /// Start a voice session for a booking and return join credentials.
    ///
    /// An existing active record is probed: if the provider confirms it
    /// live the start is refused; if the provider denies it, fails, or
    /// times out, the record is stale and is deleted before a fresh
    /// session is created. Without an active record, the remote session
    /// behind the most recent completed record is ended first if it is
    /// still live, since an earlier end may not have reached the provider.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the booking does not exist.
    /// - `AppError::Gone` if the booking's join window has closed or the
    ///   booking was cancelled.
    /// - `AppError::Conflict` if a live session already exists, or a
    ///   previous remote session is still live and cannot be ended.
    /// - `AppError::Unavailable` if the provider cannot create a session;
    ///   no local state is changed in that case.
    pub async fn start(&self, booking_id: &str) -> Result<JoinCredential> {
        let span = info_span!("start_session", booking_id);

        async move {
            // ── Re-validate booking ──────────────────────────
            let booking = self
                .bookings
                .get_by_id(booking_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))?;
            ensure_joinable(&booking, Utc::now())?;

            let agent = self.agents.get_by_id(&booking.agent_id).await?.ok_or_else(|| {
                AppError::Internal(format!(
                    "booking {booking_id} references missing agent {}",
                    booking.agent_id
                ))
            })?;

            // ── Reconcile any existing record ────────────────
            if let Some(existing) = self.records.find_active_for_booking(booking_id).await? {
                self.reconcile_existing(&existing).await?;
            } else if let Some(previous) = self.records.latest_for_booking(booking_id).await? {
                self.release_leftover(&previous).await?;
            }

            // ── Create remote session and persist ────────────
            // Detached so a cancelled caller cannot orphan a created
            // remote session without its local record.
            let this = self.clone();
            tokio::spawn(
                async move { this.create_and_persist(booking, agent).await }
                    .instrument(Span::current()),
            )
            .await
            .map_err(|err| AppError::Internal(format!("session start task failed: {err}")))?
        }
        .instrument(span)
        .await
    }

    /// Fetch a fresh join credential for the booking's active session.
    ///
    /// When the provider cannot issue one, the stale record is returned as
    /// [`RejoinOutcome::NeedsRestart`] so the caller can end and restart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the booking has no active record.
    pub async fn get_active(&self, booking_id: &str) -> Result<RejoinOutcome> {
        let span = info_span!("rejoin_session", booking_id);

        async move {
            let record = self
                .records
                .find_active_for_booking(booking_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("no active session for booking {booking_id}"))
                })?;

            let issued = self
                .bounded(
                    "issue_rejoin_credential",
                    self.provider
                        .issue_rejoin_credential(&record.remote_session_id),
                )
                .await;

            match issued {
                Ok(credential) => {
                    info!(session_record_id = %record.id, "rejoin credential issued");
                    Ok(RejoinOutcome::Ready(JoinCredential {
                        session_record_id: record.id,
                        remote_session_id: record.remote_session_id,
                        room_name: credential.room_name,
                        participant_token: credential.participant_credential,
                    }))
                }
                Err(err) => {
                    warn!(
                        session_record_id = %record.id,
                        remote_session_id = %record.remote_session_id,
                        %err,
                        "rejoin unavailable; session needs restart"
                    );
                    Ok(RejoinOutcome::NeedsRestart { record })
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Report remote liveness for a session record.
    ///
    /// The remote answer is authoritative for whether the call is running;
    /// the locally stored status is returned alongside so callers can spot
    /// drift. Last-known duration and transcript are refreshed locally
    /// while the record is still active.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the record does not exist, or
    /// `AppError::Unavailable` if the provider cannot answer.
    pub async fn status(&self, session_record_id: &str) -> Result<SessionStatusView> {
        let span = info_span!("session_status", session_record_id);

        async move {
            let record = self.require_record(session_record_id).await?;

            let liveness = self
                .bounded(
                    "probe_liveness",
                    self.provider.probe_liveness(&record.remote_session_id),
                )
                .await
                .map_err(|err| {
                    AppError::Unavailable(format!("provider could not report status: {err}"))
                })?;

            if record.is_active() {
                let transcript = Some(liveness.partial_transcript.as_str()).filter(|t| !t.is_empty());
                if let Err(err) = self
                    .records
                    .update_progress(&record.id, liveness.duration_seconds, transcript)
                    .await
                {
                    warn!(%err, "failed to store last-known session progress");
                }
            }

            Ok(SessionStatusView {
                session_record_id: record.id,
                local_status: record.status,
                active: liveness.active,
                duration_seconds: liveness.duration_seconds,
                transcript: liveness.partial_transcript,
            })
        }
        .instrument(span)
        .await
    }

    /// End a session and record its outcome.
    ///
    /// The provider is asked to tear the session down; if it cannot, the
    /// locally stored transcript and duration are used instead. Either way
    /// the record is marked completed and the booking moves to
    /// `completed`. Ending an already completed record is a no-op that
    /// returns the stored outcome.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the record does not exist, or
    /// `AppError::Db` if the completion bookkeeping cannot be persisted.
    pub async fn end(&self, session_record_id: &str) -> Result<EndSummary> {
        let span = info_span!("end_session", session_record_id);

        async move {
            let record = self.require_record(session_record_id).await?;
            if !record.is_active() {
                info!("session already completed; nothing to end");
                return stored_summary(&record);
            }

            // Detached so completion bookkeeping survives caller cancellation.
            let this = self.clone();
            tokio::spawn(async move { this.complete(record).await }.instrument(Span::current()))
                .await
                .map_err(|err| AppError::Internal(format!("session end task failed: {err}")))?
        }
        .instrument(span)
        .await
    }

    /// End the active session of a booking.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the booking has no active record,
    /// otherwise as [`Self::end`].
    pub async fn end_for_booking(&self, booking_id: &str) -> Result<EndSummary> {
        let record = self
            .records
            .find_active_for_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no active session for booking {booking_id}")))?;
        self.end(&record.id).await
    }

    /// Passthrough liveness probe of the provider itself.
    pub async fn health(&self) -> HealthReport {
        match self.bounded("health", self.provider.health()).await {
            Ok(health) => HealthReport {
                status: if health.ok {
                    HealthStatus::Ok
                } else {
                    HealthStatus::Degraded
                },
                services: health.services,
            },
            Err(err) => {
                warn!(%err, "provider health check failed");
                HealthReport {
                    status: HealthStatus::Degraded,
                    services: BTreeMap::new(),
                }
            }
        }
    }

    /// List all session records currently marked active.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<SessionRecord>> {
        self.records.list_active().await
    }

    async fn require_record(&self, session_record_id: &str) -> Result<SessionRecord> {
        self.records
            .get_by_id(session_record_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("session record {session_record_id} not found"))
            })
    }

    /// Probe the remote session behind an existing active record.
    ///
    /// Live ⇒ `Conflict`. Absent, erroring, or timed out ⇒ the record is
    /// stale and is deleted.
    async fn reconcile_existing(&self, existing: &SessionRecord) -> Result<()> {
        let probe = self
            .bounded(
                "probe_liveness",
                self.provider.probe_liveness(&existing.remote_session_id),
            )
            .await;

        match probe {
            Ok(liveness) if liveness.active => {
                info!(
                    session_record_id = %existing.id,
                    remote_session_id = %existing.remote_session_id,
                    "remote session confirmed live; refusing second start"
                );
                Err(AppError::Conflict(
                    "a session is already in progress for this booking".into(),
                ))
            }
            Ok(_) => {
                info!(
                    session_record_id = %existing.id,
                    "remote session no longer active; discarding stale record"
                );
                self.discard_stale(existing).await
            }
            Err(err) => {
                warn!(
                    session_record_id = %existing.id,
                    %err,
                    "remote session unconfirmable; discarding stale record"
                );
                self.discard_stale(existing).await
            }
        }
    }

    /// Tear down the remote session behind a completed record if the
    /// provider still reports it live.
    ///
    /// A probe that fails or times out is treated as absent.
    async fn release_leftover(&self, previous: &SessionRecord) -> Result<()> {
        let probe = self
            .bounded(
                "probe_liveness",
                self.provider.probe_liveness(&previous.remote_session_id),
            )
            .await;

        match probe {
            Ok(liveness) if liveness.active => {}
            Ok(_) => return Ok(()),
            Err(err) => {
                info!(
                    session_record_id = %previous.id,
                    %err,
                    "previous remote session unconfirmable; assuming it is gone"
                );
                return Ok(());
            }
        }

        warn!(
            session_record_id = %previous.id,
            remote_session_id = %previous.remote_session_id,
            "previous remote session outlived its record; ending it"
        );
        self.bounded(
            "end_session",
            self.provider.end_session(&previous.remote_session_id),
        )
        .await
        .map(|_| ())
        .map_err(|err| {
            warn!(%err, "failed to end previous remote session");
            AppError::Conflict(
                "a previous session for this booking is still live on the provider".into(),
            )
        })
    }

    async fn discard_stale(&self, record: &SessionRecord) -> Result<()> {
        self.records.delete(&record.id).await?;
        info!(session_record_id = %record.id, "stale session record deleted");
        Ok(())
    }

    async fn create_and_persist(self, booking: Booking, agent: Agent) -> Result<JoinCredential> {
        let request = CreateSessionRequest {
            agent_name: agent.name.clone(),
            agent_knowledge: agent.knowledge,
            room_name: room_name_for(&booking.id, Utc::now()),
        };

        let created = self
            .bounded("create_session", self.provider.create_session(request))
            .await
            .map_err(|err| {
                warn!(%err, "remote session create failed");
                AppError::Unavailable(format!("could not create remote session: {err}"))
            })?;

        let record = SessionRecord::new(
            booking.id,
            created.remote_session_id,
            created.room_name,
            Participants {
                agent_name: agent.name,
                counterpart_name: booking.counterpart_name,
                counterpart_email: booking.counterpart_email,
            },
        );

        let record = match self.records.create(&record).await {
            Ok(record) => record,
            Err(err @ AppError::Conflict(_)) => {
                // Lost a race with a concurrent start; release our session.
                warn!(
                    remote_session_id = %record.remote_session_id,
                    "concurrent start persisted first; ending duplicate remote session"
                );
                if let Err(end_err) = self
                    .bounded(
                        "end_session",
                        self.provider.end_session(&record.remote_session_id),
                    )
                    .await
                {
                    warn!(%end_err, "failed to end duplicate remote session");
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        info!(
            session_record_id = %record.id,
            remote_session_id = %record.remote_session_id,
            room_name = %record.room_name,
            "voice session started"
        );

        Ok(JoinCredential {
            session_record_id: record.id,
            remote_session_id: record.remote_session_id,
            room_name: record.room_name,
            participant_token: created.participant_credential,
        })
    }

    async fn complete(self, record: SessionRecord) -> Result<EndSummary> {
        let ended = self
            .bounded(
                "end_session",
                self.provider.end_session(&record.remote_session_id),
            )
            .await;

        let (transcript, duration_seconds, remote_confirmed) = match ended {
            Ok(ended) => {
                let transcript = if ended.transcript.is_empty() {
                    record.transcript.clone()
                } else {
                    Some(ended.transcript)
                };
                (transcript, ended.duration_seconds, true)
            }
            Err(err) => {
                warn!(%err, "provider end failed; keeping last-known transcript");
                (record.transcript.clone(), record.duration_seconds, false)
            }
        };

        let ended_at = Utc::now();
        let updated = self
            .records
            .complete_session(&record, transcript.as_deref(), duration_seconds, ended_at)
            .await?;

        if !updated {
            // A concurrent end completed the record first; report what it stored.
            let stored = self.require_record(&record.id).await?;
            return stored_summary(&stored);
        }

        info!(
            booking_id = %record.booking_id,
            duration_seconds,
            remote_confirmed,
            "voice session ended"
        );

        Ok(EndSummary {
            session_record_id: record.id,
            transcript: transcript.unwrap_or_default(),
            duration_seconds,
            ended_at,
            remote_confirmed,
        })
    }

    /// Await a provider call, failing `Unavailable` once `call_timeout` elapses.
    async fn bounded<T>(&self, operation: &str, call: ProviderFuture<'_, T>) -> Result<T> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(AppError::Unavailable(format!(
                    "provider {operation} timed out after {}ms",
                    self.call_timeout.as_millis()
                )))
            })
    }
}

/// Reject bookings that may no longer be joined at `now`.
fn ensure_joinable(booking: &Booking, now: DateTime<Utc>) -> Result<()> {
    if booking.is_expired(now) {
        return Err(AppError::Gone(format!(
            "join window for booking {} closed at {}",
            booking.id,
            booking.expires_at.to_rfc3339()
        )));
    }
    if !booking.is_joinable(now) {
        return Err(AppError::Gone(format!(
            "booking {} is {}",
            booking.id,
            booking_status_str(booking.status)
        )));
    }
    Ok(())
}

/// Room name unique per booking and attempt.
fn room_name_for(booking_id: &str, now: DateTime<Utc>) -> String {
    format!("booking-{booking_id}-{}", now.timestamp_millis())
}

fn stored_summary(record: &SessionRecord) -> Result<EndSummary> {
    let ended_at = record.ended_at.ok_or_else(|| {
        AppError::Internal(format!("completed session record {} has no end time", record.id))
    })?;

    Ok(EndSummary {
        session_record_id: record.id.clone(),
        transcript: record.transcript.clone().unwrap_or_default(),
        duration_seconds: record.duration_seconds,
        ended_at,
        remote_confirmed: false,
    })
}
