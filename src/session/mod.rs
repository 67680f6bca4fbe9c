//! Scan sessions
//!
//! The controller owns session state and the camera for the lifetime of a
//! scan view; the health monitor polls the extraction service beside it.

pub mod controller;
pub mod health;
pub mod state;

pub use controller::{SessionController, SessionServices};
pub use health::{HealthMonitor, HEALTH_POLL_INTERVAL};
pub use state::{CompletedScan, SessionOptions, SessionState};
