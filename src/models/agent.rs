//! Conversational agent configuration consumed by the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, Result};

/// Shortest join window an agent may configure, in hours.
pub const MIN_LINK_EXPIRY_HOURS: i64 = 1;
/// Longest join window an agent may configure, in hours (one week).
pub const MAX_LINK_EXPIRY_HOURS: i64 = 168;
/// Join window applied when the operator does not choose one.
pub const DEFAULT_LINK_EXPIRY_HOURS: i64 = 24;

/// Agent whose identity and knowledge are handed to the remote provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Agent {
    /// Unique record identifier.
    pub id: String,
    /// Display name spoken by the agent.
    pub name: String,
    /// Free-text knowledge context for the conversation.
    pub knowledge: String,
    /// Hours after the scheduled time during which a booking stays joinable.
    pub link_expiry_hours: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Construct a new agent with a generated identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Invalid` if the name is blank or
    /// `link_expiry_hours` is outside 1–168.
    pub fn new(name: String, knowledge: String, link_expiry_hours: i64) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(AppError::Invalid("agent name must not be empty".into()));
        }
        validate_link_expiry_hours(link_expiry_hours)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            knowledge,
            link_expiry_hours,
            created_at: Utc::now(),
        })
    }
}

/// Check that a join window lies within the accepted range.
///
/// # Errors
///
/// Returns `AppError::Invalid` when `hours` is outside 1–168.
pub fn validate_link_expiry_hours(hours: i64) -> Result<()> {
    if (MIN_LINK_EXPIRY_HOURS..=MAX_LINK_EXPIRY_HOURS).contains(&hours) {
        Ok(())
    } else {
        Err(AppError::Invalid(format!(
            "link_expiry_hours must be between {MIN_LINK_EXPIRY_HOURS} and {MAX_LINK_EXPIRY_HOURS}, got {hours}"
        )))
    }
}
