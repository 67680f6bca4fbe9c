//! Capture trait definitions
//!
//! Platform-agnostic traits for camera sources.

use crate::recorder::engine::{CaptureEngine, VideoCodec};
use crate::utils::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Supported resolutions
    pub supported_resolutions: Vec<Resolution>,
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// An acquired camera stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStream {
    /// Unique stream ID, new on every acquire
    pub id: String,

    /// Device the stream was opened on
    pub device_id: String,

    pub resolution: Resolution,

    pub fps: u32,
}

/// Where a live preview of the stream is shown
pub trait PreviewSink: Send + Sync {
    fn attach(&self, stream: &MediaStream);
    fn detach(&self);
}

/// Owner of the camera stream lifecycle
///
/// A source holds at most one stream. `release` must be safe to call any
/// number of times, including when nothing was acquired.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Source identifier
    fn id(&self) -> &str;

    /// Open the camera. Fails with `AppError::PermissionDenied` when access is refused.
    /// Acquiring while a stream is active returns the active stream.
    async fn acquire(&mut self) -> AppResult<MediaStream>;

    /// Bind a preview sink; the active stream (and every later one) is attached to it
    fn attach_preview(&mut self, sink: Arc<dyn PreviewSink>);

    /// Stop the stream and detach the preview. No-op without an active stream.
    fn release(&mut self);

    /// The active stream, if any
    fn stream(&self) -> Option<&MediaStream>;

    fn is_active(&self) -> bool {
        self.stream().is_some()
    }

    /// Whether an engine for `codec` can be opened on this source
    fn supports_codec(&self, codec: VideoCodec) -> bool;

    /// Open a capture engine on the active stream
    fn open_engine(&mut self, codec: VideoCodec) -> AppResult<Box<dyn CaptureEngine>>;
}
