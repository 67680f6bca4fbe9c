//! Extractor response adapter
//!
//! The extraction service answers in either snake_case or camelCase and is
//! loose about number encoding. Everything past this module sees only the
//! canonical [`VitalsRecord`].

use super::types::{
    BloodPressure, VitalsRecord, DEFAULT_BLOOD_PRESSURE, DEFAULT_HRV_MS, DEFAULT_STRESS_INDEX,
};
use crate::utils::{AppError, AppResult};
use serde_json::{Map, Value};

const HEART_RATE_KEYS: [&str; 4] = ["heart_rate", "heartRate", "heart_rate_bpm", "heartRateBpm"];
const HRV_KEYS: [&str; 4] = ["hrv", "hrv_ms", "hrvMs", "HRV"];
const BLOOD_PRESSURE_KEYS: [&str; 2] = ["blood_pressure", "bloodPressure"];
const STRESS_KEYS: [&str; 2] = ["stress_index", "stressIndex"];

/// Response body of the extraction endpoint, as received
#[derive(Debug, Clone, PartialEq)]
pub struct RawVitals(pub Value);

impl RawVitals {
    pub fn normalize(&self) -> AppResult<VitalsRecord> {
        normalize_vitals(&self.0)
    }
}

/// Numeric text; `NaN` and infinities are not readings
fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Numbers may arrive as JSON numbers or numeric strings
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn first_number(fields: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| fields.get(*key).and_then(as_number))
}

fn parse_blood_pressure(value: &Value) -> Option<BloodPressure> {
    match value {
        Value::Object(bp) => Some(BloodPressure {
            systolic: bp.get("systolic").and_then(as_number)?,
            diastolic: bp.get("diastolic").and_then(as_number)?,
        }),
        Value::String(text) => {
            let (systolic, diastolic) = text.split_once('/')?;
            Some(BloodPressure {
                systolic: parse_number(systolic)?,
                diastolic: parse_number(diastolic)?,
            })
        }
        _ => None,
    }
}

/// Map an extractor response onto the canonical record.
///
/// Missing HRV, blood pressure and stress are defaulted. A missing or
/// non-positive heart rate means no pulse was found and fails the extraction.
pub fn normalize_vitals(body: &Value) -> AppResult<VitalsRecord> {
    let fields = body.as_object().ok_or_else(|| {
        AppError::Extraction("vitals response is not a JSON object".to_string())
    })?;

    let heart_rate_bpm = first_number(fields, &HEART_RATE_KEYS)
        .filter(|bpm| *bpm > 0.0)
        .ok_or_else(|| {
            AppError::Extraction(
                "No pulse detected in the video. Ensure your face is well lit and stays still."
                    .to_string(),
            )
        })?;

    // Lenient defaults; logged so a misbehaving extractor stays visible
    let hrv_ms = first_number(fields, &HRV_KEYS).unwrap_or_else(|| {
        tracing::warn!("Extractor omitted HRV, defaulting to {}ms", DEFAULT_HRV_MS);
        DEFAULT_HRV_MS
    });

    let blood_pressure = BLOOD_PRESSURE_KEYS
        .iter()
        .find_map(|key| fields.get(*key).and_then(parse_blood_pressure))
        .unwrap_or_else(|| {
            tracing::warn!(
                "Extractor omitted blood pressure, defaulting to {}",
                DEFAULT_BLOOD_PRESSURE.display()
            );
            DEFAULT_BLOOD_PRESSURE
        });

    let stress_index = first_number(fields, &STRESS_KEYS).unwrap_or_else(|| {
        tracing::warn!("Extractor omitted stress index, defaulting to {}", DEFAULT_STRESS_INDEX);
        DEFAULT_STRESS_INDEX
    });

    Ok(VitalsRecord {
        heart_rate_bpm,
        hrv_ms,
        blood_pressure,
        stress_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snake_case_response() {
        let record = normalize_vitals(&json!({
            "heart_rate": 68.4,
            "hrv": 51,
            "blood_pressure": {"systolic": 117, "diastolic": 78},
            "stress_index": 22
        }))
        .unwrap();

        assert_eq!(record.heart_rate_bpm, 68.4);
        assert_eq!(record.hrv_ms, 51.0);
        assert_eq!(record.blood_pressure.systolic, 117.0);
        assert_eq!(record.stress_index, 22.0);
    }

    #[test]
    fn test_camel_case_response() {
        let record = normalize_vitals(&json!({
            "heartRate": "91",
            "bloodPressure": {"systolic": 131, "diastolic": 85},
            "stressIndex": 64.5
        }))
        .unwrap();

        assert_eq!(record.heart_rate_bpm, 91.0);
        assert_eq!(record.blood_pressure.diastolic, 85.0);
        assert_eq!(record.stress_index, 64.5);
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let record = normalize_vitals(&json!({"heart_rate": 72})).unwrap();
        assert_eq!(record.hrv_ms, DEFAULT_HRV_MS);
        assert_eq!(record.blood_pressure, DEFAULT_BLOOD_PRESSURE);
        assert_eq!(record.stress_index, DEFAULT_STRESS_INDEX);
    }

    #[test]
    fn test_blood_pressure_as_text() {
        let record = normalize_vitals(&json!({
            "heart_rate": 70,
            "blood_pressure": "124 / 82"
        }))
        .unwrap();
        assert_eq!(record.blood_pressure.systolic, 124.0);
        assert_eq!(record.blood_pressure.diastolic, 82.0);
    }

    #[test]
    fn test_non_finite_blood_pressure_text_is_defaulted() {
        for text in ["NaN/80", "120/inf", "-inf / 70"] {
            let record = normalize_vitals(&json!({
                "heart_rate": 70,
                "blood_pressure": text
            }))
            .unwrap();
            assert_eq!(record.blood_pressure, DEFAULT_BLOOD_PRESSURE, "{}", text);
        }

        let record = normalize_vitals(&json!({"heart_rate": "NaN", "hrv": "inf"}));
        assert!(matches!(record, Err(AppError::Extraction(_))));
    }

    #[test]
    fn test_missing_heart_rate_is_no_pulse() {
        let err = normalize_vitals(&json!({"hrv": 40, "stress_index": 10})).unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
        assert!(err.to_string().contains("No pulse detected"));
    }

    #[test]
    fn test_null_or_zero_heart_rate_is_no_pulse() {
        assert!(normalize_vitals(&json!({"heart_rate": null})).is_err());
        assert!(normalize_vitals(&json!({"heartRate": 0})).is_err());
    }

    #[test]
    fn test_non_object_body() {
        let err = RawVitals(json!([72])).normalize().unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
    }
}
