//! Interpretation report rendering model

pub mod parser;
pub mod types;

pub use parser::{parse_line, parse_report, strip_emphasis};
pub use types::{MetricKind, Report, ReportBlock, Segment, Severity};
