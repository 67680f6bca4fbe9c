//! Native webcam capture using nokhwa
//!
//! The camera is opened on a dedicated thread that owns it for the whole
//! stream lifetime. While a capture engine is attached, raw frames are piped
//! into FFmpeg, which encodes WebM to stdout; a reader thread collects the
//! encoded bytes for the recorder to pick up on each tick.

use super::traits::{CameraInfo, MediaSource, MediaStream, PreviewSink, Resolution};
use crate::recorder::engine::{CaptureEngine, VideoCodec};
use crate::utils::{AppError, AppResult};
use async_trait::async_trait;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

/// Get list of available cameras
pub fn list_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };

                CameraInfo {
                    id,
                    name: info.human_name().to_string(),
                    supported_resolutions: vec![
                        Resolution {
                            width: 1280,
                            height: 720,
                        },
                        Resolution {
                            width: 640,
                            height: 480,
                        },
                    ],
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// Encoders reported by `ffmpeg -encoders`, queried once
fn ffmpeg_encoders() -> &'static str {
    static ENCODERS: OnceLock<String> = OnceLock::new();
    ENCODERS.get_or_init(|| {
        Command::new("ffmpeg")
            .args(["-hide_banner", "-encoders"])
            .output()
            .map(|output| String::from_utf8_lossy(&output.stdout).to_string())
            .unwrap_or_default()
    })
}

fn ffmpeg_encoder_for(codec: VideoCodec) -> &'static str {
    match codec {
        VideoCodec::WebmVp9 => "libvpx-vp9",
        VideoCodec::Webm => "libvpx",
    }
}

/// Input arguments for the camera's native frame format
fn ffmpeg_input_args(format: &StreamFormat) -> Vec<String> {
    let pixel_format = match format.frame_format {
        FrameFormat::MJPEG => return vec!["-f".into(), "mjpeg".into(), "-i".into(), "-".into()],
        FrameFormat::YUYV => "yuyv422",
        FrameFormat::NV12 => "nv12",
        FrameFormat::RAWRGB => "rgb24",
        other => {
            tracing::warn!("Unknown camera format {:?}, falling back to yuyv422", other);
            "yuyv422"
        }
    };

    vec![
        "-f".into(),
        "rawvideo".into(),
        "-pixel_format".into(),
        pixel_format.into(),
        "-video_size".into(),
        format!("{}x{}", format.width, format.height),
        "-framerate".into(),
        format.fps.to_string(),
        "-i".into(),
        "-".into(),
    ]
}

/// Negotiated format of the open camera
#[derive(Debug, Clone, Copy)]
struct StreamFormat {
    width: u32,
    height: u32,
    fps: u32,
    frame_format: FrameFormat,
}

type FrameSink = Arc<Mutex<Option<ChildStdin>>>;

/// Camera thread handle
struct CameraThread {
    running: Arc<AtomicBool>,
    sink: FrameSink,
    handle: Option<JoinHandle<()>>,
    format: StreamFormat,
}

impl CameraThread {
    /// Ask the thread to exit after its current frame; joining is up to the caller
    fn signal_stop(&mut self) -> Option<JoinHandle<()>> {
        self.running.store(false, Ordering::SeqCst);
        self.sink.lock().take();
        self.handle.take()
    }
}

/// Wait for a camera thread on the blocking pool
async fn join_camera_thread(handle: JoinHandle<()>) {
    if let Err(e) = tokio::task::spawn_blocking(move || handle.join()).await {
        tracing::warn!("Camera thread join failed: {}", e);
    }
}

/// Join a camera thread from a synchronous context without stalling a runtime worker
fn join_detached(handle: JoinHandle<()>) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn_blocking(move || handle.join());
        }
        Err(_) => {
            let _ = handle.join();
        }
    }
}

fn map_open_error(message: String) -> AppError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("authoriz") {
        AppError::PermissionDenied(message)
    } else {
        AppError::Device(message)
    }
}

/// Webcam source backed by nokhwa
pub struct WebcamSource {
    id: String,
    device_id: Option<String>,
    stream: Option<MediaStream>,
    camera: Option<CameraThread>,
    /// Thread of a released camera that may still be shutting down
    closing: Option<JoinHandle<()>>,
    preview: Option<Arc<dyn PreviewSink>>,
}

impl WebcamSource {
    /// Create a source for a device (None = default camera)
    pub fn new(device_id: Option<String>) -> Self {
        Self {
            id: "webcam".to_string(),
            device_id,
            stream: None,
            camera: None,
            closing: None,
            preview: None,
        }
    }

    /// Wait until a previously released camera thread has let go of the device
    async fn await_closed(&mut self) {
        if let Some(handle) = self.closing.take() {
            join_camera_thread(handle).await;
        }
    }

    /// Get camera index from device_id
    fn camera_index(&self) -> CameraIndex {
        match &self.device_id {
            Some(id) => match id.parse::<u32>() {
                Ok(idx) => CameraIndex::Index(idx),
                Err(_) => CameraIndex::String(id.clone()),
            },
            None => CameraIndex::Index(0),
        }
    }

    fn spawn_camera_thread(&self) -> (CameraThread, std::sync::mpsc::Receiver<Result<StreamFormat, String>>) {
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let sink: FrameSink = Arc::new(Mutex::new(None));
        let index = self.camera_index();

        let thread_running = Arc::clone(&running);
        let thread_sink = Arc::clone(&sink);
        let handle = std::thread::spawn(move || {
            let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
            let mut camera = match Camera::new(index.clone(), format) {
                Ok(camera) => camera,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("Failed to open camera {:?}: {}", index, e)));
                    return;
                }
            };

            if let Err(e) = camera.open_stream() {
                let _ = ready_tx.send(Err(format!("Failed to open camera stream: {}", e)));
                return;
            }

            let camera_format = camera.camera_format();
            let stream_format = StreamFormat {
                width: camera_format.resolution().width(),
                height: camera_format.resolution().height(),
                fps: camera_format.frame_rate(),
                frame_format: camera_format.format(),
            };
            let _ = ready_tx.send(Ok(stream_format));

            let mut frames: u64 = 0;
            while thread_running.load(Ordering::SeqCst) {
                // Blocks until the camera delivers the next frame
                match camera.frame() {
                    Ok(frame) => {
                        let mut sink = thread_sink.lock();
                        if let Some(stdin) = sink.as_mut() {
                            if stdin.write_all(frame.buffer()).is_err() {
                                tracing::warn!("Encoder closed its input, dropping frame sink");
                                sink.take();
                            } else {
                                frames += 1;
                            }
                        }
                    }
                    Err(e) => tracing::debug!("Failed to capture frame: {:?}", e),
                }
            }

            if let Err(e) = camera.stop_stream() {
                tracing::warn!("Error stopping camera stream: {:?}", e);
            }
            tracing::info!("Camera thread stopped after encoding {} frames", frames);
        });

        (
            CameraThread {
                running,
                sink,
                handle: Some(handle),
                format: StreamFormat {
                    width: 0,
                    height: 0,
                    fps: 0,
                    frame_format: FrameFormat::YUYV,
                },
            },
            ready_rx,
        )
    }
}

#[async_trait]
impl MediaSource for WebcamSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn acquire(&mut self) -> AppResult<MediaStream> {
        if let Some(stream) = &self.stream {
            return Ok(stream.clone());
        }

        self.await_closed().await;
        let (mut camera, ready_rx) = self.spawn_camera_thread();
        let ready = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .map_err(|e| AppError::Device(format!("camera thread panicked: {}", e)))?;

        let format = match ready {
            Ok(Ok(format)) => format,
            Ok(Err(message)) => {
                if let Some(handle) = camera.signal_stop() {
                    join_camera_thread(handle).await;
                }
                return Err(map_open_error(message));
            }
            Err(_) => {
                if let Some(handle) = camera.signal_stop() {
                    join_camera_thread(handle).await;
                }
                return Err(AppError::Device("camera thread exited before opening".to_string()));
            }
        };
        camera.format = format;

        let stream = MediaStream {
            id: uuid::Uuid::new_v4().to_string(),
            device_id: self.device_id.clone().unwrap_or_else(|| "0".to_string()),
            resolution: Resolution {
                width: format.width,
                height: format.height,
            },
            fps: format.fps,
        };

        tracing::info!(
            "Webcam opened: {}x{} @ {}fps, format={:?}",
            format.width,
            format.height,
            format.fps,
            format.frame_format
        );

        if let Some(sink) = &self.preview {
            sink.attach(&stream);
        }
        self.camera = Some(camera);
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
        if let Some(handle) = self.camera.take().and_then(|mut camera| camera.signal_stop()) {
            if let Some(previous) = self.closing.replace(handle) {
                join_detached(previous);
            }
        }
        if self.stream.take().is_some() {
            if let Some(sink) = &self.preview {
                sink.detach();
            }
            tracing::info!("Webcam released");
        }
    }

    fn stream(&self) -> Option<&MediaStream> {
        self.stream.as_ref()
    }

    fn supports_codec(&self, codec: VideoCodec) -> bool {
        let encoder = ffmpeg_encoder_for(codec);
        ffmpeg_encoders()
            .lines()
            .any(|line| line.split_whitespace().nth(1) == Some(encoder))
    }

    fn open_engine(&mut self, codec: VideoCodec) -> AppResult<Box<dyn CaptureEngine>> {
        let camera = self
            .camera
            .as_ref()
            .ok_or_else(|| AppError::InvalidState("camera stream not acquired".to_string()))?;
        let engine = FfmpegEngine::spawn(codec, &camera.format, Arc::clone(&camera.sink))?;
        Ok(Box::new(engine))
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        self.release();
        if let Some(handle) = self.closing.take() {
            join_detached(handle);
        }
    }
}

/// FFmpeg process encoding camera frames to WebM on stdout
struct FfmpegEngine {
    process: Option<Child>,
    sink: FrameSink,
    pending: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
    active: bool,
}

impl FfmpegEngine {
    fn spawn(codec: VideoCodec, format: &StreamFormat, sink: FrameSink) -> AppResult<Self> {
        let mut args = vec!["-hide_banner".to_string(), "-loglevel".into(), "error".into()];
        args.extend(ffmpeg_input_args(format));
        args.extend(
            [
                "-an",
                "-c:v",
                ffmpeg_encoder_for(codec),
                "-deadline",
                "realtime",
                "-b:v",
                "1M",
                "-f",
                "webm",
                "pipe:1",
            ]
            .iter()
            .map(|s| s.to_string()),
        );

        let mut process = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AppError::Device(format!("Failed to start FFmpeg: {}", e)))?;

        let stdin = process.stdin.take();
        let mut stdout = process
            .stdout
            .take()
            .ok_or_else(|| AppError::Device("FFmpeg stdout unavailable".to_string()))?;

        let pending = Arc::new(Mutex::new(Vec::new()));
        let reader_pending = Arc::clone(&pending);
        let reader = std::thread::spawn(move || {
            let mut buf = [0u8; 16 * 1024];
            loop {
                match stdout.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => reader_pending.lock().extend_from_slice(&buf[..n]),
                    Err(e) => {
                        tracing::warn!("FFmpeg output read failed: {}", e);
                        break;
                    }
                }
            }
        });

        *sink.lock() = stdin;
        tracing::info!(
            "Started FFmpeg {} encoder: {}x{} @ {}fps",
            ffmpeg_encoder_for(codec),
            format.width,
            format.height,
            format.fps
        );

        Ok(Self {
            process: Some(process),
            sink,
            pending,
            reader: Some(reader),
            active: true,
        })
    }
}

#[async_trait]
impl CaptureEngine for FfmpegEngine {
    fn is_active(&self) -> bool {
        self.active
    }

    fn take_data(&mut self) -> Option<Vec<u8>> {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut *pending))
    }

    async fn finish(&mut self) -> AppResult<Vec<u8>> {
        self.active = false;

        let sink = Arc::clone(&self.sink);
        let pending = Arc::clone(&self.pending);
        let process = self.process.take();
        let reader = self.reader.take();
        tokio::task::spawn_blocking(move || {
            // Dropping stdin signals EOF to FFmpeg; the camera thread may hold the
            // sink while writing a frame
            sink.lock().take();
            if let Some(reader) = reader {
                let _ = reader.join();
            }
            if let Some(mut process) = process {
                match process.wait() {
                    Ok(status) if !status.success() => {
                        tracing::warn!("FFmpeg exited with status {}", status)
                    }
                    Err(e) => tracing::warn!("Failed to wait for FFmpeg: {}", e),
                    _ => {}
                }
            }
            std::mem::take(&mut *pending.lock())
        })
        .await
        .map_err(|e| AppError::Device(format!("encoder shutdown panicked: {}", e)))
    }
}

impl Drop for FfmpegEngine {
    fn drop(&mut self) {
        self.sink.lock().take();
        if let Some(mut process) = self.process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
    }
}
