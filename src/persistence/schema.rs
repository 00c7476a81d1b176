//! `SQLite` schema bootstrap logic.
//!
//! All definitions use `IF NOT EXISTS` and are safe to re-run on every
//! server startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table and index definitions to the connected database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS agents (
    id                TEXT PRIMARY KEY NOT NULL,
    name              TEXT NOT NULL,
    knowledge         TEXT NOT NULL DEFAULT '',
    link_expiry_hours INTEGER NOT NULL CHECK(link_expiry_hours BETWEEN 1 AND 168),
    created_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bookings (
    id                TEXT PRIMARY KEY NOT NULL,
    agent_id          TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
    counterpart_name  TEXT NOT NULL,
    counterpart_email TEXT NOT NULL,
    scheduled_at      TEXT NOT NULL,
    expires_at        TEXT NOT NULL,
    status            TEXT NOT NULL CHECK(status IN ('pending','confirmed','completed','cancelled','expired')),
    meeting_token     TEXT NOT NULL UNIQUE,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS session_records (
    id                TEXT PRIMARY KEY NOT NULL,
    booking_id        TEXT NOT NULL REFERENCES bookings(id) ON DELETE CASCADE,
    remote_session_id TEXT NOT NULL,
    room_name         TEXT NOT NULL,
    status            TEXT NOT NULL CHECK(status IN ('active','completed')),
    transcript        TEXT,
    duration_seconds  INTEGER NOT NULL DEFAULT 0,
    started_at        TEXT NOT NULL,
    ended_at          TEXT,
    agent_name        TEXT NOT NULL,
    counterpart_name  TEXT NOT NULL,
    counterpart_email TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bookings_agent ON bookings(agent_id);
CREATE INDEX IF NOT EXISTS idx_session_records_booking ON session_records(booking_id);
CREATE UNIQUE INDEX IF NOT EXISTS uq_session_records_active_booking
    ON session_records(booking_id) WHERE status = 'active';
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
