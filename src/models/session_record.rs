//! Durable local record of a voice session and its outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status for a session record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionRecordStatus {
    /// Remote session believed to be running.
    Active,
    /// Session ended; record kept for audit.
    Completed,
}

/// Participant metadata captured for audit when a session starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Participants {
    /// Agent display name.
    pub agent_name: String,
    /// Counterpart display name.
    pub counterpart_name: String,
    /// Counterpart email.
    pub counterpart_email: String,
}

/// Session record linking a booking to a remote provider session.
///
/// `remote_session_id` is a reference, not ownership: the provider may
/// have discarded the session without this record knowing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionRecord {
    /// Unique record identifier.
    pub id: String,
    /// Owning booking identifier.
    pub booking_id: String,
    /// Provider-assigned session identifier.
    pub remote_session_id: String,
    /// Provider room the participants connect to.
    pub room_name: String,
    /// Current lifecycle status.
    pub status: SessionRecordStatus,
    /// Last captured transcript, if any.
    pub transcript: Option<String>,
    /// Last known duration in seconds.
    pub duration_seconds: i64,
    /// Start timestamp.
    pub started_at: DateTime<Utc>,
    /// End timestamp, set once completed.
    pub ended_at: Option<DateTime<Utc>>,
    /// Audit metadata.
    #[serde(flatten)]
    pub participants: Participants,
}

impl SessionRecord {
    /// Construct an active record for a freshly created remote session.
    #[must_use]
    pub fn new(
        booking_id: String,
        remote_session_id: String,
        room_name: String,
        participants: Participants,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            booking_id,
            remote_session_id,
            room_name,
            status: SessionRecordStatus::Active,
            transcript: None,
            duration_seconds: 0,
            started_at: Utc::now(),
            ended_at: None,
            participants,
        }
    }

    /// Whether the record is still marked active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionRecordStatus::Active
    }
}
