//! Local interpretation template
//!
//! Used whenever the remote interpreter misses its deadline or fails. The
//! output follows the same tag grammar as the remote service so it renders
//! through the same parser.

use crate::vitals::VitalsRecord;

/// Heart rates above this are reported as elevated
pub const ELEVATED_HEART_RATE_BPM: f64 = 100.0;

const FALLBACK_VERDICT: &str = "**VERDICT:** Automated local summary. The AI interpreter was \
unavailable, so only threshold checks were applied. Repeat the scan or consult a clinician for \
a full interpretation.";

/// Render the deterministic fallback report for `vitals`
pub fn fallback_report(vitals: &VitalsRecord) -> String {
    let elevated = vitals.heart_rate_bpm > ELEVATED_HEART_RATE_BPM;
    let status = if elevated { "ELEVATED" } else { "STABLE" };
    let heart_note = if elevated {
        "Heart rate is above the typical resting range"
    } else {
        "Heart rate is within the typical resting range"
    };

    format!(
        "### REPORT_STATUS: {status}\n\
         \n\
         **Key Findings**\n\
         * [BPM: {bpm}] - {heart_note}\n\
         * [BP: {bp}] - Estimated blood pressure from facial video analysis\n\
         \n\
         {FALLBACK_VERDICT}",
        bpm = vitals.rounded_heart_rate(),
        bp = vitals.blood_pressure.display(),
    )
}
