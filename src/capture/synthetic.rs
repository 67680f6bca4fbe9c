//! Synthetic camera
//!
//! A hardware-free media source that produces deterministic clip bytes.
//! Used for dry runs without a webcam and throughout the test suite.

use super::traits::{CameraInfo, MediaSource, MediaStream, PreviewSink, Resolution};
use crate::recorder::engine::{CaptureEngine, VideoCodec};
use crate::utils::{AppError, AppResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Bytes produced per tick by default
const DEFAULT_BYTES_PER_TICK: usize = 4096;

const RESOLUTION: Resolution = Resolution {
    width: 640,
    height: 480,
};

/// Hardware-free camera
pub struct SyntheticCamera {
    id: String,
    permission_granted: bool,
    supported_codecs: Vec<VideoCodec>,
    bytes_per_tick: usize,
    stream: Option<MediaStream>,
    preview: Option<Arc<dyn PreviewSink>>,
    release_count: Arc<Mutex<usize>>,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self {
            id: "synthetic".to_string(),
            permission_granted: true,
            supported_codecs: VideoCodec::PREFERENCE.to_vec(),
            bytes_per_tick: DEFAULT_BYTES_PER_TICK,
            stream: None,
            preview: None,
            release_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Refuse camera access on every acquire
    pub fn deny_permission(mut self) -> Self {
        self.permission_granted = false;
        self
    }

    /// Restrict the codecs engines can be opened with
    pub fn with_codecs(mut self, codecs: Vec<VideoCodec>) -> Self {
        self.supported_codecs = codecs;
        self
    }

    /// Bytes produced per tick; zero simulates a camera that never delivers frames
    pub fn with_bytes_per_tick(mut self, bytes: usize) -> Self {
        self.bytes_per_tick = bytes;
        self
    }

    /// Device description for camera listings
    pub fn info(&self) -> CameraInfo {
        CameraInfo {
            id: self.id.clone(),
            name: "Synthetic camera".to_string(),
            supported_resolutions: vec![RESOLUTION],
        }
    }

    /// Shared counter of releases that actually stopped a stream
    pub fn release_counter(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.release_count)
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for SyntheticCamera {
    fn id(&self) -> &str {
        &self.id
    }

    async fn acquire(&mut self) -> AppResult<MediaStream> {
        if !self.permission_granted {
            return Err(AppError::PermissionDenied(
                "Camera access was blocked. Allow camera access and press Retry Live.".to_string(),
            ));
        }

        if let Some(stream) = &self.stream {
            return Ok(stream.clone());
        }

        let stream = MediaStream {
            id: uuid::Uuid::new_v4().to_string(),
            device_id: self.id.clone(),
            resolution: RESOLUTION,
            fps: 30,
        };

        if let Some(sink) = &self.preview {
            sink.attach(&stream);
        }

        tracing::info!("Synthetic camera stream {} acquired", stream.id);
        self.stream = Some(stream.clone());
        Ok(stream)
    }

    fn attach_preview(&mut self, sink: Arc<dyn PreviewSink>) {
        if let Some(stream) = &self.stream {
            sink.attach(stream);
        }
        self.preview = Some(sink);
    }

    fn release(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        if let Some(sink) = &self.preview {
            sink.detach();
        }
        *self.release_count.lock() += 1;
        tracing::info!("Synthetic camera stream {} released", stream.id);
    }

    fn stream(&self) -> Option<&MediaStream> {
        self.stream.as_ref()
    }

    fn supports_codec(&self, codec: VideoCodec) -> bool {
        self.supported_codecs.contains(&codec)
    }

    fn open_engine(&mut self, codec: VideoCodec) -> AppResult<Box<dyn CaptureEngine>> {
        if self.stream.is_none() {
            return Err(AppError::InvalidState("camera stream not acquired".to_string()));
        }
        if !self.supports_codec(codec) {
            return Err(AppError::Device(format!("codec {:?} not supported", codec)));
        }
        Ok(Box::new(SyntheticEngine::new(self.bytes_per_tick)))
    }
}

/// Engine producing a fixed number of patterned bytes per tick
pub struct SyntheticEngine {
    bytes_per_tick: usize,
    produced: usize,
    active: bool,
}

impl SyntheticEngine {
    pub fn new(bytes_per_tick: usize) -> Self {
        Self {
            bytes_per_tick,
            produced: 0,
            active: true,
        }
    }

    fn next_chunk(&mut self) -> Vec<u8> {
        let start = self.produced;
        self.produced += self.bytes_per_tick;
        (start..self.produced).map(|i| (i % 251) as u8).collect()
    }
}

#[async_trait]
impl CaptureEngine for SyntheticEngine {
    fn is_active(&self) -> bool {
        self.active
    }

    fn take_data(&mut self) -> Option<Vec<u8>> {
        if !self.is_active() || self.bytes_per_tick == 0 {
            return None;
        }
        Some(self.next_chunk())
    }

    async fn finish(&mut self) -> AppResult<Vec<u8>> {
        let was_active = std::mem::replace(&mut self.active, false);
        if !was_active || self.bytes_per_tick == 0 {
            return Ok(Vec::new());
        }
        // Final partial chunk flushed on stop
        let mut tail = self.next_chunk();
        tail.truncate(self.bytes_per_tick / 2);
        Ok(tail)
    }
}
