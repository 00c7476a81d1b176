//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Booking or session record does not exist locally.
    NotFound(String),
    /// Booking exists but its join window has closed.
    Gone(String),
    /// A live session already exists for the booking.
    Conflict(String),
    /// Remote conversation provider unreachable or erroring.
    Unavailable(String),
    /// Caller is not authorized to perform the requested action.
    Unauthorized(String),
    /// Caller supplied a value outside the accepted range.
    Invalid(String),
    /// Unexpected failure; logged with context, surfaced generically.
    Internal(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Short machine-readable kind used in API error bodies.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Db(_) => "db",
            Self::NotFound(_) => "not_found",
            Self::Gone(_) => "gone",
            Self::Conflict(_) => "conflict",
            Self::Unavailable(_) => "unavailable",
            Self::Unauthorized(_) => "unauthorized",
            Self::Invalid(_) => "invalid",
            Self::Internal(_) => "internal",
            Self::Io(_) => "io",
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Gone(msg) => write!(f, "gone: {msg}"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::Unavailable(msg) => write!(f, "unavailable: {msg}"),
            Self::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            Self::Invalid(msg) => write!(f, "invalid: {msg}"),
            Self::Internal(msg) => write!(f, "internal: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Unavailable(format!("provider request timed out: {err}"))
        } else {
            Self::Unavailable(format!("provider request failed: {err}"))
        }
    }
}
