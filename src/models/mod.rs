//! Domain model module declarations.

pub mod agent;
pub mod booking;
pub mod credential;
pub mod session_record;
