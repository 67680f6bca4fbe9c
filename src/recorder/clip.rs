//! Clip recorder
//!
//! Buffers a bounded-duration clip from a media source. A 1-second tick
//! recomputes the elapsed time and pulls engine data into the chunk buffer.
//! At the recording ceiling the ticker seals the clip on its own: the engine
//! is flushed and the recorder moves to `Finalizing` until `stop()` collects it.

use super::engine::{CaptureEngine, VideoCodec};
use super::state::{
    CaptureProgress, CaptureSession, ClipPayload, RecorderState, RECORDING_CEILING_SECS,
    TICK_INTERVAL,
};
use crate::capture::MediaSource;
use crate::utils::{AppError, AppResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Events emitted during recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// Recording started
    Started { simulation: bool },
    /// Elapsed time update in whole seconds
    Tick { elapsed_seconds: u64 },
    /// The hard ceiling was hit and capture has stopped; `stop()` collects the clip
    CeilingReached,
    /// Recording stopped and finalized
    Stopped,
}

struct RecorderInner {
    session: CaptureSession,
    engine: Option<Box<dyn CaptureEngine>>,
    codec: Option<VideoCodec>,
    started: Option<Instant>,
    simulation: bool,
    /// Engine flush performed by the ticker at the ceiling
    sealed_tail: Option<AppResult<Vec<u8>>>,
}

impl RecorderInner {
    fn elapsed_seconds(&self) -> u64 {
        self.started
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
            .min(RECORDING_CEILING_SECS)
    }

    fn reset(&mut self) {
        self.session.state = RecorderState::Idle;
        self.engine = None;
        self.codec = None;
        self.started = None;
        self.simulation = false;
        self.sealed_tail = None;
    }
}

/// Records one clip at a time: `Idle → Recording → Finalizing → Idle`
pub struct ClipRecorder {
    inner: Arc<Mutex<RecorderInner>>,
    ticker: Option<JoinHandle<()>>,
    event_tx: broadcast::Sender<RecorderEvent>,
}

impl ClipRecorder {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Mutex::new(RecorderInner {
                session: CaptureSession::default(),
                engine: None,
                codec: None,
                started: None,
                simulation: false,
                sealed_tail: None,
            })),
            ticker: None,
            event_tx,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.inner.lock().session.state
    }

    pub fn progress(&self) -> CaptureProgress {
        self.inner.lock().session.progress()
    }

    /// Subscribe to recorder events
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }

    /// Start recording from an acquired media source.
    ///
    /// The codec is negotiated once here: the preferred codec if the source
    /// supports it, otherwise the generic fallback.
    pub fn start_live(&mut self, source: &mut dyn MediaSource) -> AppResult<VideoCodec> {
        self.ensure_idle()?;

        let codec = VideoCodec::negotiate(|c| source.supports_codec(c)).ok_or_else(|| {
            AppError::Device(format!("camera '{}' supports no WebM codec", source.id()))
        })?;
        let engine = source.open_engine(codec)?;

        tracing::info!("Recording from '{}' as {}", source.id(), codec.mime_type());
        self.begin(Some(engine), Some(codec), false);
        Ok(codec)
    }

    /// Start a simulated recording. No camera or codec is touched.
    pub fn start_simulated(&mut self) -> AppResult<()> {
        self.ensure_idle()?;
        tracing::info!("Recording in simulation mode");
        self.begin(None, None, true);
        Ok(())
    }

    fn ensure_idle(&self) -> AppResult<()> {
        let state = self.state();
        if state != RecorderState::Idle {
            return Err(AppError::InvalidState(format!(
                "recorder is {:?}, expected Idle",
                state
            )));
        }
        Ok(())
    }

    fn begin(
        &mut self,
        engine: Option<Box<dyn CaptureEngine>>,
        codec: Option<VideoCodec>,
        simulation: bool,
    ) {
        {
            let mut inner = self.inner.lock();
            inner.session.begin();
            inner.engine = engine;
            inner.codec = codec;
            inner.started = Some(Instant::now());
            inner.simulation = simulation;
        }

        let _ = self.event_tx.send(RecorderEvent::Started { simulation });
        self.ticker = Some(tokio::spawn(run_ticker(
            Arc::clone(&self.inner),
            self.event_tx.clone(),
        )));
    }

    /// Stop recording and finalize the clip.
    ///
    /// Returns `Ok(None)` when the recorder is idle. After the ceiling the
    /// clip sealed by the ticker is collected. In live mode an empty clip
    /// fails with `AppError::EmptyCapture`.
    pub async fn stop(&mut self) -> AppResult<Option<ClipPayload>> {
        let (engine, sealed) = {
            let mut inner = self.inner.lock();
            match inner.session.state {
                RecorderState::Idle => {
                    tracing::debug!("Stop ignored, recorder is idle");
                    return Ok(None);
                }
                RecorderState::Recording => {
                    inner.session.state = RecorderState::Finalizing;
                    inner.session.elapsed_seconds = inner.elapsed_seconds();
                    (inner.engine.take(), false)
                }
                RecorderState::Finalizing => (None, true),
            }
        };

        if let Some(ticker) = self.ticker.take() {
            if sealed {
                // The ticker may still be flushing the engine
                let _ = ticker.await;
            } else {
                ticker.abort();
            }
        }

        // Engine flush; without an engine finalization is immediate
        let tail = match engine {
            Some(mut engine) if engine.is_active() => engine.finish().await,
            _ => Ok(Vec::new()),
        };

        let (tail, chunks, elapsed, codec, simulation) = {
            let mut inner = self.inner.lock();
            let tail = inner.sealed_tail.take().unwrap_or(tail);
            let chunks = std::mem::take(&mut inner.session.recorded_chunks);
            let captured = (
                tail,
                chunks,
                inner.session.elapsed_seconds,
                inner.codec,
                inner.simulation,
            );
            inner.reset();
            captured
        };
        let _ = self.event_tx.send(RecorderEvent::Stopped);

        let tail = tail?;
        if simulation {
            tracing::info!("Simulated recording stopped after {}s", elapsed);
            return Ok(Some(ClipPayload::Simulated));
        }

        let mut bytes = chunks.concat();
        bytes.extend_from_slice(&tail);
        if bytes.is_empty() {
            tracing::warn!("Recording finalized without any data after {}s", elapsed);
            return Err(AppError::EmptyCapture);
        }

        let codec = codec.unwrap_or(VideoCodec::Webm);
        tracing::info!(
            "Recording stopped after {}s: {} bytes of {}",
            elapsed,
            bytes.len(),
            codec.mime_type()
        );
        Ok(Some(ClipPayload::Clip { bytes, codec }))
    }
}

impl Default for ClipRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ClipRecorder {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

async fn run_ticker(inner: Arc<Mutex<RecorderInner>>, event_tx: broadcast::Sender<RecorderEvent>) {
    let mut interval = tokio::time::interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);

    loop {
        interval.tick().await;

        let elapsed = {
            let mut guard = inner.lock();
            let inner = &mut *guard;
            if inner.session.state != RecorderState::Recording {
                break;
            }

            let elapsed = inner.elapsed_seconds();
            inner.session.elapsed_seconds = elapsed;

            if let Some(engine) = inner.engine.as_mut().filter(|e| e.is_active()) {
                if let Some(data) = engine.take_data().filter(|d| !d.is_empty()) {
                    tracing::debug!("Buffered {} bytes at {}s", data.len(), elapsed);
                    inner.session.recorded_chunks.push(data);
                }
            }
            elapsed
        };

        let _ = event_tx.send(RecorderEvent::Tick {
            elapsed_seconds: elapsed,
        });

        if elapsed >= RECORDING_CEILING_SECS {
            tracing::info!("Recording ceiling of {}s reached", RECORDING_CEILING_SECS);
            seal_at_ceiling(&inner).await;
            let _ = event_tx.send(RecorderEvent::CeilingReached);
            break;
        }
    }
}

/// Stop capturing and flush the engine without waiting for the owner
async fn seal_at_ceiling(inner: &Mutex<RecorderInner>) {
    let engine = {
        let mut inner = inner.lock();
        inner.session.state = RecorderState::Finalizing;
        inner.engine.take()
    };

    let tail = match engine {
        Some(mut engine) if engine.is_active() => engine.finish().await,
        _ => Ok(Vec::new()),
    };
    inner.lock().sealed_tail = Some(tail);
}
