//! Transient values returned to callers of the orchestrator.
//!
//! None of these are persisted: join credentials are re-issued on every
//! request and never cached beyond a single response.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::booking::{Booking, BookingStatus};
use super::session_record::{SessionRecord, SessionRecordStatus};

/// Per-participant token plus routing data for one remote session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JoinCredential {
    /// Local session record identifier.
    pub session_record_id: String,
    /// Provider-assigned session identifier.
    pub remote_session_id: String,
    /// Room the participant connects to.
    pub room_name: String,
    /// Short-lived participant token.
    pub participant_token: String,
}

/// Result of a rejoin attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejoinOutcome {
    /// A fresh credential was issued for the live session.
    Ready(JoinCredential),
    /// The provider could not issue a credential; the caller should end
    /// the session and start a new one.
    NeedsRestart {
        /// Last known state of the stale record.
        record: SessionRecord,
    },
}

impl RejoinOutcome {
    /// Whether the caller must restart the session.
    #[must_use]
    pub fn needs_restart(&self) -> bool {
        matches!(self, Self::NeedsRestart { .. })
    }
}

#[derive(Serialize)]
struct RejoinWire<'a> {
    needs_restart: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential: Option<&'a JoinCredential>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<&'a SessionRecord>,
}

impl Serialize for RejoinOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Ready(credential) => RejoinWire {
                needs_restart: false,
                credential: Some(credential),
                session: None,
            },
            Self::NeedsRestart { record } => RejoinWire {
                needs_restart: true,
                credential: None,
                session: Some(record),
            },
        };
        wire.serialize(serializer)
    }
}

/// Remote liveness reported next to the locally stored status.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionStatusView {
    /// Local session record identifier.
    pub session_record_id: String,
    /// Locally stored status.
    pub local_status: SessionRecordStatus,
    /// Whether the provider reports the call as still running.
    pub active: bool,
    /// Elapsed duration reported by the provider.
    pub duration_seconds: i64,
    /// Partial transcript reported by the provider.
    pub transcript: String,
}

/// Outcome of ending a session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EndSummary {
    /// Local session record identifier.
    pub session_record_id: String,
    /// Final transcript (remote if available, else last stored).
    pub transcript: String,
    /// Final duration in seconds.
    pub duration_seconds: i64,
    /// When the record was marked completed.
    pub ended_at: DateTime<Utc>,
    /// Whether the provider acknowledged the termination.
    pub remote_confirmed: bool,
}

/// Booking view returned by the capability token resolver.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResolvedBooking {
    /// Stored booking.
    pub booking: Booking,
    /// Name of the agent the booking is with.
    pub agent_name: String,
    /// Status as observed at resolution time.
    pub effective_status: BookingStatus,
    /// Whether the join window has closed.
    pub is_expired: bool,
    /// Whether a session may currently be started.
    pub is_joinable: bool,
}
