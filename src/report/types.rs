//! Report block types

use serde::{Deserialize, Serialize};

/// Rendering class of a status banner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Positive,
    Negative,
}

/// Vital a metric tag refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    #[serde(rename = "HR")]
    HeartRate,
    #[serde(rename = "BP")]
    BloodPressure,
    #[serde(rename = "HRV")]
    Hrv,
}

impl MetricKind {
    /// Map a tag label (`BPM`, `BP`, `HRV`) to its kind
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "BPM" => Some(MetricKind::HeartRate),
            "BP" => Some(MetricKind::BloodPressure),
            "HRV" => Some(MetricKind::Hrv),
            _ => None,
        }
    }
}

/// Piece of a finding line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Segment {
    PlainText { text: String },
    MetricTag { kind: MetricKind, value: String },
}

/// One renderable block; each non-blank report line yields exactly one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReportBlock {
    #[serde(rename_all = "camelCase")]
    StatusBanner {
        status: String,
        severity_class: Severity,
    },
    FindingLine { segments: Vec<Segment> },
    VerdictBlock { text: String },
    Heading { text: String },
    PlainLine { text: String },
}

/// Parsed report in source line order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub blocks: Vec<ReportBlock>,
}

impl Report {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// First status banner, if any
    pub fn status(&self) -> Option<(&str, Severity)> {
        self.blocks.iter().find_map(|block| match block {
            ReportBlock::StatusBanner {
                status,
                severity_class,
            } => Some((status.as_str(), *severity_class)),
            _ => None,
        })
    }

    /// All metric tags across finding lines, in order
    pub fn metric_tags(&self) -> Vec<(MetricKind, &str)> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                ReportBlock::FindingLine { segments } => Some(segments),
                _ => None,
            })
            .flatten()
            .filter_map(|segment| match segment {
                Segment::MetricTag { kind, value } => Some((*kind, value.as_str())),
                Segment::PlainText { .. } => None,
            })
            .collect()
    }

    pub fn verdict(&self) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            ReportBlock::VerdictBlock { text } => Some(text.as_str()),
            _ => None,
        })
    }
}
