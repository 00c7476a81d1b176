//! Booking model: a time-bounded appointment for a voice conversation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::Agent;

/// Lifecycle status for a booking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Booked but not yet confirmed by the operator.
    Pending,
    /// Confirmed by the operator.
    Confirmed,
    /// Conversation took place and has ended.
    Completed,
    /// Cancelled before the conversation took place.
    Cancelled,
    /// Join window closed without a conversation.
    Expired,
}

/// Booking domain entity persisted in `SQLite`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Booking {
    /// Unique record identifier.
    pub id: String,
    /// Agent the conversation is held with.
    pub agent_id: String,
    /// Name of the person who booked.
    pub counterpart_name: String,
    /// Email of the person who booked.
    pub counterpart_email: String,
    /// Scheduled start of the conversation.
    pub scheduled_at: DateTime<Utc>,
    /// End of the join window.
    pub expires_at: DateTime<Utc>,
    /// Current lifecycle status.
    pub status: BookingStatus,
    /// Capability token granting access to the join flow; immutable.
    pub meeting_token: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Construct a pending booking for `agent`, deriving `expires_at` from
    /// the agent's join window.
    #[must_use]
    pub fn new(
        agent: &Agent,
        counterpart_name: String,
        counterpart_email: String,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent.id.clone(),
            counterpart_name,
            counterpart_email,
            scheduled_at,
            expires_at: scheduled_at + Duration::hours(agent.link_expiry_hours),
            status: BookingStatus::Pending,
            meeting_token: generate_meeting_token(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the join window has closed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether the booking was withdrawn and may never be joined again.
    ///
    /// `Completed` is not closed: a conversation may be restarted within
    /// the join window after its session was ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(
            self.status,
            BookingStatus::Cancelled | BookingStatus::Expired
        )
    }

    /// Whether a session may be started for this booking at `now`.
    #[must_use]
    pub fn is_joinable(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && !self.is_closed()
    }

    /// Status as observed at `now`; open bookings past their window read as
    /// `Expired` even when that status was never stored.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> BookingStatus {
        match self.status {
            BookingStatus::Pending | BookingStatus::Confirmed if self.is_expired(now) => {
                BookingStatus::Expired
            }
            other => other,
        }
    }

    /// Determine whether an explicit status update is permitted.
    #[must_use]
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self.status, next),
            (
                BookingStatus::Pending,
                BookingStatus::Confirmed
                    | BookingStatus::Completed
                    | BookingStatus::Cancelled
                    | BookingStatus::Expired
            ) | (
                BookingStatus::Confirmed,
                BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Expired
            )
        )
    }
}

/// Generate an unguessable meeting-access token (64 lowercase hex chars).
#[must_use]
pub fn generate_meeting_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
