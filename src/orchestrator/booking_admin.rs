//! Operator-side management of agents and bookings.
//!
//! Bookings are normally created by an upstream scheduler; this is the
//! surface it (or an operator at the CLI) uses. Session lifecycle stays
//! with the session orchestrator.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::agent::{Agent, DEFAULT_LINK_EXPIRY_HOURS};
use crate::models::booking::{Booking, BookingStatus};
use crate::models::session_record::SessionRecord;
use crate::persistence::agent_repo::AgentRepo;
use crate::persistence::booking_repo::BookingRepo;
use crate::persistence::db::Database;
use crate::persistence::session_record_repo::SessionRecordRepo;
use crate::{AppError, Result};

/// Creates and maintains agents and bookings.
#[derive(Clone)]
pub struct BookingAdmin {
    agents: AgentRepo,
    bookings: BookingRepo,
    records: SessionRecordRepo,
}

impl BookingAdmin {
    /// Create an admin surface over `db`.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            agents: AgentRepo::new(Arc::clone(&db)),
            bookings: BookingRepo::new(Arc::clone(&db)),
            records: SessionRecordRepo::new(db),
        }
    }

    /// Register an agent. The join window defaults to
    /// [`DEFAULT_LINK_EXPIRY_HOURS`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Invalid` for a blank name or an out-of-range
    /// join window, or `AppError::Db` if persistence fails.
    pub async fn create_agent(
        &self,
        name: String,
        knowledge: String,
        link_expiry_hours: Option<i64>,
    ) -> Result<Agent> {
        let agent = Agent::new(
            name,
            knowledge,
            link_expiry_hours.unwrap_or(DEFAULT_LINK_EXPIRY_HOURS),
        )?;
        let agent = self.agents.create(&agent).await?;
        info!(agent_id = %agent.id, "agent created");
        Ok(agent)
    }

    /// Remove an agent together with its bookings and their history.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the agent does not exist.
    pub async fn delete_agent(&self, agent_id: &str) -> Result<()> {
        if !self.agents.delete(agent_id).await? {
            return Err(AppError::NotFound(format!("agent {agent_id} not found")));
        }
        info!(agent_id, "agent deleted");
        Ok(())
    }

    /// Book a conversation with an agent. The returned booking carries the
    /// meeting token to hand to the counterpart.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the agent does not exist.
    /// - `AppError::Invalid` if the counterpart name or email is unusable.
    pub async fn create_booking(
        &self,
        agent_id: &str,
        counterpart_name: String,
        counterpart_email: String,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Booking> {
        if counterpart_name.trim().is_empty() {
            return Err(AppError::Invalid("counterpart name must not be empty".into()));
        }
        if !is_plausible_email(&counterpart_email) {
            return Err(AppError::Invalid(format!(
                "counterpart email {counterpart_email:?} is not an address"
            )));
        }

        let agent = self
            .agents
            .get_by_id(agent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("agent {agent_id} not found")))?;

        let booking = self
            .bookings
            .create(&Booking::new(&agent, counterpart_name, counterpart_email, scheduled_at))
            .await?;
        info!(
            booking_id = %booking.id,
            agent_id,
            expires_at = %booking.expires_at.to_rfc3339(),
            "booking created"
        );
        Ok(booking)
    }

    /// Move a booking through its state machine.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the booking does not exist or
    /// `AppError::Invalid` if the transition is not permitted.
    pub async fn update_status(&self, booking_id: &str, status: BookingStatus) -> Result<Booking> {
        let booking = self.bookings.update_status(booking_id, status).await?;
        info!(booking_id, status = ?booking.status, "booking status updated");
        Ok(booking)
    }

    /// Every session record of a booking, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the booking does not exist.
    pub async fn session_history(&self, booking_id: &str) -> Result<Vec<SessionRecord>> {
        if self.bookings.get_by_id(booking_id).await?.is_none() {
            return Err(AppError::NotFound(format!("booking {booking_id} not found")));
        }
        self.records.list_for_booking(booking_id).await
    }
}

fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
        && !email.contains(char::is_whitespace)
}
