//! Line grammar for interpretation text
//!
//! Each non-blank line is classified by the first rule that matches:
//!
//! 1. `#...STATUS...` status banner
//! 2. any `[BPM: v]`, `[BP: v]` or `[HRV: v]` tag makes a finding line
//! 3. `VERDICT` (optionally behind `#` or `*`) verdict block
//! 4. `#` or `**` prefix heading
//! 5. anything else is a plain line
//!
//! Blank lines produce nothing.

use super::types::{MetricKind, Report, ReportBlock, Segment, Severity};
use regex::Regex;
use std::sync::OnceLock;

const STATUS_KEYWORD: &str = "STATUS";
const VERDICT_KEYWORD: &str = "VERDICT";

fn metric_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\s*(BPM|BP|HRV)\s*:\s*([^\]]*?)\s*\]").expect("metric tag pattern compiles")
    })
}

/// Parse a whole report
pub fn parse_report(text: &str) -> Report {
    Report {
        blocks: text.lines().filter_map(parse_line).collect(),
    }
}

/// Classify one line; `None` for blank lines
pub fn parse_line(line: &str) -> Option<ReportBlock> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if line.starts_with('#') && line.contains(STATUS_KEYWORD) {
        return Some(status_banner(line));
    }

    if metric_tag_regex().is_match(line) {
        return Some(ReportBlock::FindingLine {
            segments: split_segments(line),
        });
    }

    let unmarked = line.trim_start_matches(['#', '*', ' ']);
    if let Some(rest) = unmarked.strip_prefix(VERDICT_KEYWORD) {
        let text = strip_emphasis(rest);
        let text = text.trim_start_matches(':').trim();
        return Some(ReportBlock::VerdictBlock {
            text: text.to_string(),
        });
    }

    if line.starts_with('#') || line.starts_with("**") {
        return Some(ReportBlock::Heading {
            text: strip_emphasis(line.trim_start_matches('#')).trim().to_string(),
        });
    }

    Some(ReportBlock::PlainLine {
        text: strip_emphasis(line).trim().to_string(),
    })
}

fn status_banner(line: &str) -> ReportBlock {
    let after_keyword = line
        .find(STATUS_KEYWORD)
        .map(|idx| &line[idx + STATUS_KEYWORD.len()..])
        .unwrap_or(line);
    let status = strip_emphasis(after_keyword)
        .trim_start_matches(':')
        .trim()
        .to_string();

    let severity_class = if status.contains("OPTIMAL") || status.contains("STABLE") {
        Severity::Positive
    } else {
        Severity::Negative
    };

    ReportBlock::StatusBanner {
        status,
        severity_class,
    }
}

fn split_segments(line: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for caps in metric_tag_regex().captures_iter(line) {
        let Some(whole) = caps.get(0) else { continue };
        push_plain(&mut segments, &line[cursor..whole.start()]);

        if let Some(kind) = caps.get(1).and_then(|m| MetricKind::from_label(m.as_str())) {
            segments.push(Segment::MetricTag {
                kind,
                value: caps
                    .get(2)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            });
        }
        cursor = whole.end();
    }
    push_plain(&mut segments, &line[cursor..]);

    segments
}

fn push_plain(segments: &mut Vec<Segment>, raw: &str) {
    let text = strip_emphasis(raw);
    if !text.trim().is_empty() {
        segments.push(Segment::PlainText { text });
    }
}

/// Remove markdown emphasis markers
pub fn strip_emphasis(text: &str) -> String {
    text.replace('*', "")
}
