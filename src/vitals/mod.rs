//! Vitals extraction
//!
//! Client for the external extraction service, the adapter that normalizes
//! its responses, and the service health probe.

pub mod client;
pub mod health;
pub mod normalize;
pub mod types;

pub use client::{ServiceEndpoints, VitalsClient, VitalsExtractor};
pub use health::{HealthErrorType, HealthProbe, ServiceStatus};
pub use normalize::{normalize_vitals, RawVitals};
pub use types::{BloodPressure, ScanMode, VitalsRecord, DEFAULT_HRV_MS};
