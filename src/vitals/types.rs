//! Canonical vitals types

use serde::{Deserialize, Serialize};

/// HRV substituted when the extractor omits it
pub const DEFAULT_HRV_MS: f64 = 45.0;

/// Blood pressure substituted when the extractor omits it
pub const DEFAULT_BLOOD_PRESSURE: BloodPressure = BloodPressure {
    systolic: 120.0,
    diastolic: 80.0,
};

/// Stress index substituted when the extractor omits it
pub const DEFAULT_STRESS_INDEX: f64 = 0.0;

/// Blood pressure estimate in mmHg
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BloodPressure {
    pub systolic: f64,
    pub diastolic: f64,
}

impl BloodPressure {
    /// `s/d` with both values rounded, as used in report tags
    pub fn display(&self) -> String {
        format!("{}/{}", self.systolic.round(), self.diastolic.round())
    }
}

impl Default for BloodPressure {
    fn default() -> Self {
        DEFAULT_BLOOD_PRESSURE
    }
}

/// Vitals after normalization. Every field is always populated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsRecord {
    pub heart_rate_bpm: f64,
    pub hrv_ms: f64,
    pub blood_pressure: BloodPressure,
    pub stress_index: f64,
}

impl VitalsRecord {
    /// Heart rate rounded to whole beats per minute
    pub fn rounded_heart_rate(&self) -> i64 {
        self.heart_rate_bpm.round() as i64
    }
}

/// Whether the scan was run against a real camera or in simulation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    #[default]
    Live,
    Simulation,
}

impl ScanMode {
    pub fn from_simulation(simulation: bool) -> Self {
        if simulation {
            ScanMode::Simulation
        } else {
            ScanMode::Live
        }
    }

    pub fn is_simulation(&self) -> bool {
        matches!(self, ScanMode::Simulation)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Live => "live",
            ScanMode::Simulation => "simulation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blood_pressure_display_rounds() {
        let bp = BloodPressure {
            systolic: 118.6,
            diastolic: 76.2,
        };
        assert_eq!(bp.display(), "119/76");
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = VitalsRecord {
            heart_rate_bpm: 72.0,
            hrv_ms: DEFAULT_HRV_MS,
            blood_pressure: BloodPressure::default(),
            stress_index: DEFAULT_STRESS_INDEX,
        };
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["heartRateBpm"], 72.0);
        assert_eq!(json["bloodPressure"]["systolic"], 120.0);
    }
}
