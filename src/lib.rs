#![forbid(unsafe_code)]

//! Booking-gated voice session orchestration.
//!
//! Resolves meeting-access tokens to bookings and manages the lifecycle
//! of remotely hosted voice sessions, reconciling local session records
//! against a conversation provider that may forget sessions, restart, or
//! become unreachable.

pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod provider;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
