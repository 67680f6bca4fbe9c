//! Camera capture implementations
//!
//! This module provides the media sources a scan can record from.

pub mod synthetic;
pub mod traits;

#[cfg(feature = "native-camera")]
pub mod webcam;

// Re-export traits
pub use traits::{CameraInfo, MediaSource, MediaStream, PreviewSink, Resolution};

pub use synthetic::SyntheticCamera;

#[cfg(feature = "native-camera")]
pub use webcam::{list_cameras, WebcamSource};
