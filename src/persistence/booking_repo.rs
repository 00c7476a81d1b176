//! Booking repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::Utc;

use crate::models::booking::{Booking, BookingStatus};
use crate::{AppError, Result};

use super::db::Database;
use super::parse_timestamp;

/// Repository wrapper around `SQLite` for booking records.
#[derive(Clone)]
pub struct BookingRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct BookingRow {
    id: String,
    agent_id: String,
    counterpart_name: String,
    counterpart_email: String,
    scheduled_at: String,
    expires_at: String,
    status: String,
    meeting_token: String,
    created_at: String,
    updated_at: String,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking> {
        Ok(Booking {
            status: parse_booking_status(&self.status)?,
            scheduled_at: parse_timestamp("scheduled_at", &self.scheduled_at)?,
            expires_at: parse_timestamp("expires_at", &self.expires_at)?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            id: self.id,
            agent_id: self.agent_id,
            counterpart_name: self.counterpart_name,
            counterpart_email: self.counterpart_email,
            meeting_token: self.meeting_token,
        })
    }
}

fn parse_booking_status(s: &str) -> Result<BookingStatus> {
    match s {
        "pending" => Ok(BookingStatus::Pending),
        "confirmed" => Ok(BookingStatus::Confirmed),
        "completed" => Ok(BookingStatus::Completed),
        "cancelled" => Ok(BookingStatus::Cancelled),
        "expired" => Ok(BookingStatus::Expired),
        other => Err(AppError::Db(format!("invalid booking status: {other}"))),
    }
}

/// Column value stored for a booking status.
#[must_use]
pub fn booking_status_str(s: BookingStatus) -> &'static str {
    match s {
        BookingStatus::Pending => "pending",
        BookingStatus::Confirmed => "confirmed",
        BookingStatus::Completed => "completed",
        BookingStatus::Cancelled => "cancelled",
        BookingStatus::Expired => "expired",
    }
}

impl BookingRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new booking record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails, including when the
    /// meeting token collides with an existing booking.
    pub async fn create(&self, booking: &Booking) -> Result<Booking> {
        sqlx::query(
            "INSERT INTO bookings (id, agent_id, counterpart_name, counterpart_email,
             scheduled_at, expires_at, status, meeting_token, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&booking.id)
        .bind(&booking.agent_id)
        .bind(&booking.counterpart_name)
        .bind(&booking.counterpart_email)
        .bind(booking.scheduled_at.to_rfc3339())
        .bind(booking.expires_at.to_rfc3339())
        .bind(booking_status_str(booking.status))
        .bind(&booking.meeting_token)
        .bind(booking.created_at.to_rfc3339())
        .bind(booking.updated_at.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;

        Ok(booking.clone())
    }

    /// Retrieve a booking by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as("SELECT * FROM bookings WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(BookingRow::into_booking).transpose()
    }

    /// Retrieve a booking by its meeting-access token.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<Booking>> {
        let row: Option<BookingRow> =
            sqlx::query_as("SELECT * FROM bookings WHERE meeting_token = ?1")
                .bind(token)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(BookingRow::into_booking).transpose()
    }

    /// Apply an explicit status update, respecting the booking state machine.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the booking does not exist,
    /// `AppError::Invalid` if the transition is not permitted, or
    /// `AppError::Db` if persistence fails.
    pub async fn update_status(&self, id: &str, status: BookingStatus) -> Result<Booking> {
        let mut current = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

        if !current.can_transition_to(status) {
            return Err(AppError::Invalid(format!(
                "cannot move booking from {} to {}",
                booking_status_str(current.status),
                booking_status_str(status)
            )));
        }

        current.status = status;
        current.updated_at = Utc::now();

        sqlx::query("UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(booking_status_str(status))
            .bind(current.updated_at.to_rfc3339())
            .bind(id)
            .execute(self.db.as_ref())
            .await?;

        Ok(current)
    }
}
