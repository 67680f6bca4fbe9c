//! Capture engine abstraction
//!
//! A capture engine turns an acquired camera stream into encoded clip bytes.
//! The recorder pulls whatever the engine has produced once per tick and asks
//! it to flush when recording stops.

use crate::utils::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Container/codec combinations a capture engine can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VideoCodec {
    /// WebM with VP9 video
    WebmVp9,
    /// WebM with whatever video codec the engine defaults to
    Webm,
}

impl VideoCodec {
    /// Negotiation order, preferred first
    pub const PREFERENCE: [VideoCodec; 2] = [VideoCodec::WebmVp9, VideoCodec::Webm];

    /// MIME type sent to the extraction endpoint
    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoCodec::WebmVp9 => "video/webm;codecs=vp9",
            VideoCodec::Webm => "video/webm",
        }
    }

    /// MIME type without codec parameters
    pub fn container_mime_type(&self) -> &'static str {
        "video/webm"
    }

    pub fn file_extension(&self) -> &'static str {
        "webm"
    }

    /// Pick the first codec in preference order that `supported` accepts.
    pub fn negotiate(supported: impl Fn(VideoCodec) -> bool) -> Option<VideoCodec> {
        Self::PREFERENCE.into_iter().find(|codec| supported(*codec))
    }
}

/// Encoder bound to one acquired stream for the duration of one recording
#[async_trait]
pub trait CaptureEngine: Send {
    /// Whether the engine is still producing data
    fn is_active(&self) -> bool;

    /// Take the data produced since the previous call, if any
    fn take_data(&mut self) -> Option<Vec<u8>>;

    /// Flush and finalize the engine, returning any data not yet taken
    async fn finish(&mut self) -> AppResult<Vec<u8>>;
}
