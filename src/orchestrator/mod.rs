//! Session orchestration modules.
//!
//! Covers capability-token resolution for the public join flow, the
//! voice session lifecycle reconciled against the remote provider, and
//! operator management of agents and bookings.

pub mod booking_admin;
pub mod session_orchestrator;
pub mod token_resolver;

pub use booking_admin::BookingAdmin;
pub use session_orchestrator::{HealthReport, HealthStatus, SessionOrchestrator};
pub use token_resolver::TokenResolver;
