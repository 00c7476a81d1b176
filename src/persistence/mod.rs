//! Persistence layer modules.

pub mod agent_repo;
pub mod booking_repo;
pub mod db;
pub mod schema;
pub mod session_record_repo;

use chrono::{DateTime, Utc};

use crate::{AppError, Result};

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;

/// Parse an RFC 3339 column value into a UTC timestamp.
pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {column}: {e}")))
}
