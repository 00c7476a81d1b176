//! Session record repository for `SQLite` persistence.
//!
//! At most one `active` record may exist per booking; the partial unique
//! index backing this is surfaced as `AppError::Conflict` on insert.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::session_record::{Participants, SessionRecord, SessionRecordStatus};
use crate::{AppError, Result};

use super::db::Database;
use super::parse_timestamp;

/// Repository wrapper around `SQLite` for session records.
#[derive(Clone)]
pub struct SessionRecordRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct SessionRecordRow {
    id: String,
    booking_id: String,
    remote_session_id: String,
    room_name: String,
    status: String,
    transcript: Option<String>,
    duration_seconds: i64,
    started_at: String,
    ended_at: Option<String>,
    agent_name: String,
    counterpart_name: String,
    counterpart_email: String,
}

impl SessionRecordRow {
    fn into_record(self) -> Result<SessionRecord> {
        let status = parse_record_status(&self.status)?;
        let started_at = parse_timestamp("started_at", &self.started_at)?;
        let ended_at = self
            .ended_at
            .as_deref()
            .map(|s| parse_timestamp("ended_at", s))
            .transpose()?;

        Ok(SessionRecord {
            id: self.id,
            booking_id: self.booking_id,
            remote_session_id: self.remote_session_id,
            room_name: self.room_name,
            status,
            transcript: self.transcript,
            duration_seconds: self.duration_seconds,
            started_at,
            ended_at,
            participants: Participants {
                agent_name: self.agent_name,
                counterpart_name: self.counterpart_name,
                counterpart_email: self.counterpart_email,
            },
        })
    }
}

fn parse_record_status(s: &str) -> Result<SessionRecordStatus> {
    match s {
        "active" => Ok(SessionRecordStatus::Active),
        "completed" => Ok(SessionRecordStatus::Completed),
        other => Err(AppError::Db(format!("invalid session record status: {other}"))),
    }
}

fn record_status_str(s: SessionRecordStatus) -> &'static str {
    match s {
        SessionRecordStatus::Active => "active",
        SessionRecordStatus::Completed => "completed",
    }
}

impl SessionRecordRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new session record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` if an active record already exists for
    /// the same booking, or `AppError::Db` if the insert otherwise fails.
    pub async fn create(&self, record: &SessionRecord) -> Result<SessionRecord> {
        let result = sqlx::query(
            "INSERT INTO session_records (id, booking_id, remote_session_id, room_name, status,
             transcript, duration_seconds, started_at, ended_at, agent_name, counterpart_name,
             counterpart_email)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(&record.id)
        .bind(&record.booking_id)
        .bind(&record.remote_session_id)
        .bind(&record.room_name)
        .bind(record_status_str(record.status))
        .bind(&record.transcript)
        .bind(record.duration_seconds)
        .bind(record.started_at.to_rfc3339())
        .bind(record.ended_at.map(|dt| dt.to_rfc3339()))
        .bind(&record.participants.agent_name)
        .bind(&record.participants.counterpart_name)
        .bind(&record.participants.counterpart_email)
        .execute(self.db.as_ref())
        .await;

        match result {
            Ok(_) => Ok(record.clone()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(AppError::Conflict(format!(
                    "booking {} already has an active session",
                    record.booking_id
                )))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Retrieve a session record by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<SessionRecord>> {
        let row: Option<SessionRecordRow> =
            sqlx::query_as("SELECT * FROM session_records WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(SessionRecordRow::into_record).transpose()
    }

    /// Retrieve the active session record for a booking, if any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_active_for_booking(&self, booking_id: &str) -> Result<Option<SessionRecord>> {
        let row: Option<SessionRecordRow> = sqlx::query_as(
            "SELECT * FROM session_records WHERE booking_id = ?1 AND status = 'active' LIMIT 1",
        )
        .bind(booking_id)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map(SessionRecordRow::into_record).transpose()
    }

    /// Retrieve the most recently inserted record for a booking, whatever
    /// its status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn latest_for_booking(&self, booking_id: &str) -> Result<Option<SessionRecord>> {
        let row: Option<SessionRecordRow> = sqlx::query_as(
            "SELECT * FROM session_records WHERE booking_id = ?1 ORDER BY rowid DESC LIMIT 1",
        )
        .bind(booking_id)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map(SessionRecordRow::into_record).transpose()
    }

    /// List every record for a booking in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_booking(&self, booking_id: &str) -> Result<Vec<SessionRecord>> {
        let rows: Vec<SessionRecordRow> = sqlx::query_as(
            "SELECT * FROM session_records WHERE booking_id = ?1 ORDER BY rowid ASC",
        )
        .bind(booking_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(SessionRecordRow::into_record).collect()
    }

    /// List all active session records, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<SessionRecord>> {
        let rows: Vec<SessionRecordRow> = sqlx::query_as(
            "SELECT * FROM session_records WHERE status = 'active' ORDER BY started_at DESC",
        )
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(SessionRecordRow::into_record).collect()
    }

    /// Store the last-known duration and transcript of an active record.
    ///
    /// Completed records are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn update_progress(
        &self,
        id: &str,
        duration_seconds: i64,
        transcript: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE session_records
             SET duration_seconds = ?1, transcript = COALESCE(?2, transcript)
             WHERE id = ?3 AND status = 'active'",
        )
        .bind(duration_seconds)
        .bind(transcript)
        .bind(id)
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Mark a record `completed` with its final transcript and duration and
    /// move its booking to `completed`, in one transaction.
    ///
    /// Only an `active` record is updated; returns whether it was. When it
    /// was not, the booking is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if either update fails; neither is applied.
    pub async fn complete_session(
        &self,
        record: &SessionRecord,
        transcript: Option<&str>,
        duration_seconds: i64,
        ended_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            "UPDATE session_records
             SET status = 'completed', transcript = ?1, duration_seconds = ?2, ended_at = ?3
             WHERE id = ?4 AND status = 'active'",
        )
        .bind(transcript)
        .bind(duration_seconds)
        .bind(ended_at.to_rfc3339())
        .bind(&record.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE bookings SET status = 'completed', updated_at = ?1 WHERE id = ?2")
            .bind(ended_at.to_rfc3339())
            .bind(&record.booking_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Delete a record outright (used for stale records).
    ///
    /// Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM session_records WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
