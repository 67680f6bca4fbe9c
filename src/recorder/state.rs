//! Recording state management
//!
//! Defines the recorder state machine and the per-session capture buffer.

use super::engine::VideoCodec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard ceiling for every recording. Not configurable per call.
pub const RECORDING_CEILING_SECS: u64 = 15;

/// Interval of the elapsed-time tick
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Current state of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// No recording in progress
    #[default]
    Idle,
    /// Currently recording
    Recording,
    /// Engine is flushing the final data
    Finalizing,
}

/// Buffered state of one capture
#[derive(Debug, Clone, Default)]
pub struct CaptureSession {
    pub state: RecorderState,

    /// Wall-clock start of the recording
    pub started_at: Option<DateTime<Utc>>,

    /// Whole seconds recorded so far, capped at the ceiling
    pub elapsed_seconds: u64,

    /// Data handed over by the engine, one entry per tick
    pub recorded_chunks: Vec<Vec<u8>>,
}

impl CaptureSession {
    /// Reset for a new recording starting now
    pub fn begin(&mut self) {
        self.state = RecorderState::Recording;
        self.started_at = Some(Utc::now());
        self.elapsed_seconds = 0;
        self.recorded_chunks.clear();
    }

    pub fn buffered_bytes(&self) -> usize {
        self.recorded_chunks.iter().map(Vec::len).sum()
    }

    pub fn progress(&self) -> CaptureProgress {
        CaptureProgress {
            state: self.state,
            started_at: self.started_at,
            elapsed_seconds: self.elapsed_seconds,
            chunk_count: self.recorded_chunks.len(),
            buffered_bytes: self.buffered_bytes(),
        }
    }
}

/// Serializable view of a capture for the UI layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureProgress {
    pub state: RecorderState,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    pub chunk_count: usize,
    pub buffered_bytes: usize,
}

/// What a finalized recording hands to the extractor
#[derive(Debug, Clone, PartialEq)]
pub enum ClipPayload {
    /// Encoded clip from a live camera
    Clip { bytes: Vec<u8>, codec: VideoCodec },
    /// Sentinel produced in simulation mode; no camera was touched
    Simulated,
}

impl ClipPayload {
    pub fn len(&self) -> usize {
        match self {
            ClipPayload::Clip { bytes, .. } => bytes.len(),
            ClipPayload::Simulated => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
