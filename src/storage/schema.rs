//! Persisted scan schema
//!
//! The camelCase shape handed to the persistence collaborator and written by
//! the local store.

use crate::vitals::{BloodPressure, ScanMode, VitalsRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stress index above which a scan is flagged
pub const HIGH_STRESS_THRESHOLD: f64 = 50.0;

// =============================================================================
// Scan Result
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StressLevel {
    Normal,
    High,
}

impl StressLevel {
    pub fn from_index(stress_index: f64) -> Self {
        if stress_index > HIGH_STRESS_THRESHOLD {
            StressLevel::High
        } else {
            StressLevel::Normal
        }
    }
}

/// Outcome of one completed session. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub id: Uuid,
    pub heart_rate: f64,
    pub hrv: f64,
    pub blood_pressure: BloodPressure,
    pub stress_level: StressLevel,
    pub timestamp: DateTime<Utc>,
    pub ai_interpretation: String,
}

impl ScanResult {
    pub fn from_vitals(vitals: &VitalsRecord, ai_interpretation: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            heart_rate: vitals.heart_rate_bpm,
            hrv: vitals.hrv_ms,
            blood_pressure: vitals.blood_pressure,
            stress_level: StressLevel::from_index(vitals.stress_index),
            timestamp: Utc::now(),
            ai_interpretation: ai_interpretation.into(),
        }
    }
}

// =============================================================================
// Local Document
// =============================================================================

/// On-disk document written by the local store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredScan {
    pub mode: ScanMode,
    pub saved_at: DateTime<Utc>,
    #[serde(flatten)]
    pub scan: ScanResult,
}

// =============================================================================
// Storage Badge
// =============================================================================

/// Where a result ended up, shown next to the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBadge {
    Cloud,
    Local,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vitals(stress_index: f64) -> VitalsRecord {
        VitalsRecord {
            heart_rate_bpm: 72.0,
            hrv_ms: 48.0,
            blood_pressure: BloodPressure {
                systolic: 118.0,
                diastolic: 76.0,
            },
            stress_index,
        }
    }

    #[test]
    fn test_stress_level_threshold() {
        assert_eq!(StressLevel::from_index(50.0), StressLevel::Normal);
        assert_eq!(StressLevel::from_index(50.5), StressLevel::High);
    }

    #[test]
    fn test_scan_result_shape() {
        let scan = ScanResult::from_vitals(&vitals(62.0), "report");
        let json = serde_json::to_value(&scan).unwrap();

        assert_eq!(json["heartRate"], 72.0);
        assert_eq!(json["hrv"], 48.0);
        assert_eq!(json["bloodPressure"]["systolic"], 118.0);
        assert_eq!(json["stressLevel"], "High");
        assert_eq!(json["aiInterpretation"], "report");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_each_result_gets_fresh_id() {
        let a = ScanResult::from_vitals(&vitals(0.0), "");
        let b = ScanResult::from_vitals(&vitals(0.0), "");
        assert_ne!(a.id, b.id);
    }
}
