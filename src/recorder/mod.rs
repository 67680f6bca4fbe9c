//! Recording system module
//!
//! This module implements bounded clip recording:
//! - CaptureEngine trait for codec-specific encoders
//! - ClipRecorder driving the 1-second tick and the 15-second ceiling
//! - Capture state and the payload handed to the extractor

pub mod clip;
pub mod engine;
pub mod state;

pub use clip::{ClipRecorder, RecorderEvent};
pub use engine::{CaptureEngine, VideoCodec};
pub use state::{
    CaptureProgress, CaptureSession, ClipPayload, RecorderState, RECORDING_CEILING_SECS,
};
