//! Capability token resolution for the public join flow.
//!
//! A meeting-access token is the only credential an unauthenticated
//! participant holds. Resolution is read-only: it never mutates the
//! booking, and an expired booking still resolves so the caller can show
//! a "link expired" page instead of a not-found error.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::credential::ResolvedBooking;
use crate::persistence::agent_repo::AgentRepo;
use crate::persistence::booking_repo::BookingRepo;
use crate::{AppError, Result};

/// Resolves meeting-access tokens to bookings and their join state.
#[derive(Clone)]
pub struct TokenResolver {
    bookings: BookingRepo,
    agents: AgentRepo,
}

impl TokenResolver {
    /// Create a resolver over the booking and agent stores.
    #[must_use]
    pub fn new(bookings: BookingRepo, agents: AgentRepo) -> Self {
        Self { bookings, agents }
    }

    /// Resolve `token` against the current time.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no booking carries the token, or
    /// `AppError::Db` if the lookup fails.
    pub async fn resolve(&self, token: &str) -> Result<ResolvedBooking> {
        self.resolve_at(token, Utc::now()).await
    }

    /// Resolve `token` as observed at `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no booking carries the token, or
    /// `AppError::Db` if the lookup fails.
    pub async fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Result<ResolvedBooking> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::NotFound("meeting link not found".into()));
        }

        let booking = self
            .bookings
            .get_by_token(token)
            .await?
            .ok_or_else(|| AppError::NotFound("meeting link not found".into()))?;

        let agent_name = self
            .agents
            .get_by_id(&booking.agent_id)
            .await?
            .map(|agent| agent.name)
            .unwrap_or_default();

        let is_expired = booking.is_expired(now);
        let is_joinable = booking.is_joinable(now);
        debug!(booking_id = %booking.id, is_expired, is_joinable, "meeting token resolved");

        Ok(ResolvedBooking {
            effective_status: booking.effective_status(now),
            agent_name,
            is_expired,
            is_joinable,
            booking,
        })
    }
}
