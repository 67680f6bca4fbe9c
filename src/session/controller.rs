//! Scan session controller
//!
//! Orchestrates one scan end to end: camera, recording, extraction,
//! interpretation, parsing and persistence. State lives here and is handed
//! to UI consumers through `snapshot()` and `subscribe()`.

use super::health::HealthMonitor;
use super::state::{CompletedScan, SessionOptions, SessionState};
use crate::capture::{MediaSource, PreviewSink};
use crate::interpretation::InterpretationClient;
use crate::recorder::{ClipPayload, ClipRecorder, RecorderEvent};
use crate::report::parse_report;
use crate::storage::{ScanResult, ScanStore, StorageBadge};
use crate::utils::{AppError, AppResult};
use crate::vitals::{HealthProbe, ScanMode, ServiceStatus, VitalsExtractor};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

/// Collaborators a controller drives
pub struct SessionServices {
    pub media: Box<dyn MediaSource>,
    pub extractor: Arc<dyn VitalsExtractor>,
    pub interpreter: InterpretationClient,
    /// Primary store; its badge is shown when a save succeeds
    pub store: Arc<dyn ScanStore>,
    /// Written when the primary store refuses the scan
    pub local_fallback: Option<Arc<dyn ScanStore>>,
}

struct SessionShared {
    state: RwLock<SessionState>,
    events: broadcast::Sender<SessionState>,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
    options: Arc<RwLock<SessionOptions>>,
    media: tokio::sync::Mutex<Box<dyn MediaSource>>,
    recorder: tokio::sync::Mutex<ClipRecorder>,
    extractor: Arc<dyn VitalsExtractor>,
    interpreter: InterpretationClient,
    store: Arc<dyn ScanStore>,
    local_fallback: Option<Arc<dyn ScanStore>>,
}

impl SessionShared {
    fn set_state(&self, next: SessionState) {
        {
            let mut state = self.state.write();
            if state.label() != next.label() {
                tracing::info!("Session {} -> {}", state.label(), next.label());
            }
            *state = next.clone();
        }
        let _ = self.events.send(next);
    }
}

pub struct SessionController {
    shared: Arc<SessionShared>,
    run: Option<JoinHandle<()>>,
    health: Option<HealthMonitor>,
}

impl SessionController {
    pub fn new(services: SessionServices, options: SessionOptions) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            shared: Arc::new(SessionShared {
                state: RwLock::new(SessionState::Idle),
                events,
                stop_tx: Mutex::new(None),
                options: Arc::new(RwLock::new(options)),
                media: tokio::sync::Mutex::new(services.media),
                recorder: tokio::sync::Mutex::new(ClipRecorder::new()),
                extractor: services.extractor,
                interpreter: services.interpreter,
                store: services.store,
                local_fallback: services.local_fallback,
            }),
            run: None,
            health: None,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.shared.state.read().clone()
    }

    /// Receive every state change from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionState> {
        self.shared.events.subscribe()
    }

    pub fn options(&self) -> SessionOptions {
        *self.shared.options.read()
    }

    /// Change options between sessions. Refused while a session is in flight.
    pub fn set_options(&self, options: SessionOptions) -> bool {
        if self.shared.state.read().is_busy() {
            tracing::debug!("Options change ignored while a session is running");
            return false;
        }
        *self.shared.options.write() = options;
        true
    }

    /// Bind a preview surface to the camera
    pub async fn attach_preview(&self, sink: Arc<dyn PreviewSink>) {
        self.shared.media.lock().await.attach_preview(sink);
    }

    /// Begin a session. A no-op returning `false` while one is in flight.
    pub fn start(&mut self) -> bool {
        {
            let mut state = self.shared.state.write();
            if state.is_busy() {
                tracing::debug!("Start ignored, session is {}", state.label());
                return false;
            }
            *state = SessionState::Capturing { elapsed_seconds: 0 };
        }
        tracing::info!("Session started");
        let _ = self
            .shared
            .events
            .send(SessionState::Capturing { elapsed_seconds: 0 });

        let (stop_tx, stop_rx) = oneshot::channel();
        *self.shared.stop_tx.lock() = Some(stop_tx);
        self.run = Some(tokio::spawn(run_session(Arc::clone(&self.shared), stop_rx)));
        true
    }

    /// Stop recording early and move on to processing
    pub fn request_stop(&self) -> bool {
        match self.shared.stop_tx.lock().take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Return a finished session to `Idle` and release the camera
    pub async fn clear(&self) -> bool {
        {
            let mut state = self.shared.state.write();
            if !state.is_terminal() {
                return false;
            }
            *state = SessionState::Idle;
        }
        let _ = self.shared.events.send(SessionState::Idle);
        self.shared.media.lock().await.release();
        tracing::info!("Session cleared");
        true
    }

    /// Clear a finished session and immediately start a new one
    pub async fn retry(&mut self) -> bool {
        self.clear().await;
        self.start()
    }

    /// Start polling service health for as long as the controller lives
    pub fn start_health_polling(&mut self, probe: Arc<dyn HealthProbe>) {
        self.health = Some(HealthMonitor::spawn(
            probe,
            Arc::clone(&self.shared.options),
        ));
    }

    pub fn service_status(&self) -> Option<ServiceStatus> {
        self.health.as_ref().and_then(HealthMonitor::status)
    }

    /// Cancel any running session and release the camera
    pub async fn shutdown(mut self) {
        self.health = None;
        if let Some(run) = self.run.take() {
            run.abort();
            let _ = run.await;
        }
        self.shared.media.lock().await.release();
        tracing::info!("Session controller shut down");
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            run.abort();
        }
        match self.shared.media.try_lock() {
            Ok(mut media) => media.release(),
            Err(_) => tracing::warn!("Camera busy during drop, it is released when the source drops"),
        }
    }
}

async fn run_session(shared: Arc<SessionShared>, stop_rx: oneshot::Receiver<()>) {
    let options = *shared.options.read();

    match process(&shared, options, stop_rx).await {
        Ok(completed) => {
            tracing::info!(
                "Session complete: {} bpm, stored {:?}",
                completed.result.heart_rate.round(),
                completed.storage
            );
            shared.set_state(SessionState::Result(Box::new(completed)));
        }
        Err(e) => {
            tracing::error!("Session failed: {}", e);
            shared.set_state(SessionState::Error {
                message: e.user_message(),
            });
        }
    }
}

async fn process(
    shared: &SessionShared,
    options: SessionOptions,
    stop_rx: oneshot::Receiver<()>,
) -> AppResult<CompletedScan> {
    let payload = record_clip(shared, options.simulation, stop_rx).await;
    shared.media.lock().await.release();
    let payload = payload?;

    let vitals = shared
        .extractor
        .extract(&payload, options.simulation, options.use_proxy)
        .await?;

    let interpretation = shared.interpreter.interpret(&vitals).await;
    let report = parse_report(&interpretation.text);

    let result = ScanResult::from_vitals(&vitals, interpretation.text);
    let storage = persist(shared, &result, options.mode()).await;

    Ok(CompletedScan {
        result,
        report,
        storage,
        interpretation_source: interpretation.source,
    })
}

async fn record_clip(
    shared: &SessionShared,
    simulation: bool,
    mut stop_rx: oneshot::Receiver<()>,
) -> AppResult<ClipPayload> {
    let mut recorder = shared.recorder.lock().await;
    let mut events = recorder.subscribe();

    if simulation {
        recorder.start_simulated()?;
    } else {
        let mut media = shared.media.lock().await;
        media.acquire().await?;
        recorder.start_live(&mut **media)?;
    }

    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                tracing::info!("Stop requested after {}s", recorder.progress().elapsed_seconds);
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(RecorderEvent::Tick { elapsed_seconds }) => {
                        shared.set_state(SessionState::Capturing { elapsed_seconds });
                    }
                    Ok(RecorderEvent::CeilingReached) => break,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("Missed {} recorder events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    shared.stop_tx.lock().take();
    shared.set_state(SessionState::Processing);

    recorder.stop().await?.ok_or_else(|| {
        AppError::InvalidState("recorder stopped before the clip was finalized".to_string())
    })
}

async fn persist(shared: &SessionShared, result: &ScanResult, mode: ScanMode) -> StorageBadge {
    if shared.store.save_scan_result(result, mode).await {
        return shared.store.badge();
    }

    match &shared.local_fallback {
        Some(local) if local.save_scan_result(result, mode).await => {
            tracing::info!("Scan {} kept in local history", result.id);
        }
        Some(_) => tracing::warn!("Scan {} could not be stored anywhere", result.id),
        None => {}
    }
    StorageBadge::Local
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SyntheticCamera;
    use crate::interpretation::{InterpretationPrompt, InterpretationSource, Interpreter};
    use crate::recorder::RECORDING_CEILING_SECS;
    use crate::report::Severity;
    use crate::vitals::{
        normalize_vitals, BloodPressure, HealthErrorType, ServiceEndpoints, VitalsClient,
        VitalsRecord,
    };
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    struct FakeExtractor {
        response: Value,
        calls: Arc<Mutex<Vec<(usize, bool)>>>,
    }

    impl FakeExtractor {
        fn returning(response: Value) -> Self {
            Self {
                response,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl VitalsExtractor for FakeExtractor {
        async fn extract(
            &self,
            payload: &ClipPayload,
            simulation: bool,
            _use_proxy: bool,
        ) -> AppResult<VitalsRecord> {
            self.calls.lock().push((payload.len(), simulation));
            normalize_vitals(&self.response)
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl VitalsExtractor for FailingExtractor {
        async fn extract(&self, _: &ClipPayload, _: bool, _: bool) -> AppResult<VitalsRecord> {
            Err(AppError::Extraction(
                "network error: error sending request".to_string(),
            ))
        }
    }

    struct SlowExtractor;

    #[async_trait]
    impl VitalsExtractor for SlowExtractor {
        async fn extract(&self, _: &ClipPayload, _: bool, _: bool) -> AppResult<VitalsRecord> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            normalize_vitals(&good_vitals())
        }
    }

    struct CannedInterpreter;

    #[async_trait]
    impl Interpreter for CannedInterpreter {
        async fn complete(&self, prompt: &InterpretationPrompt) -> AppResult<String> {
            Ok(format!(
                "### REPORT_STATUS: OPTIMAL\n* [BPM: {}] - Resting\n**VERDICT:** Fine",
                prompt.heart_rate.round()
            ))
        }
    }

    struct MemoryStore {
        accept: bool,
        badge: StorageBadge,
        saved: Mutex<Vec<ScanResult>>,
    }

    impl MemoryStore {
        fn new(badge: StorageBadge, accept: bool) -> Arc<Self> {
            Arc::new(Self {
                accept,
                badge,
                saved: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ScanStore for MemoryStore {
        fn badge(&self) -> StorageBadge {
            self.badge
        }

        async fn save_scan_result(&self, scan: &ScanResult, _mode: ScanMode) -> bool {
            if self.accept {
                self.saved.lock().push(scan.clone());
            }
            self.accept
        }
    }

    /// Online for the first check, unreachable afterwards
    #[derive(Default)]
    struct FlakyService {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HealthProbe for FlakyService {
        async fn check_health(&self, _mode: ScanMode, _use_proxy: bool) -> ServiceStatus {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                ServiceStatus::online("ok")
            } else {
                ServiceStatus::failed(HealthErrorType::Network, "down", "connection refused")
            }
        }
    }

    fn good_vitals() -> Value {
        json!({
            "heart_rate": 71.6,
            "hrv": 52,
            "blood_pressure": {"systolic": 117, "diastolic": 77},
            "stress_index": 20
        })
    }

    fn controller_with(
        camera: SyntheticCamera,
        extractor: Arc<dyn VitalsExtractor>,
        store: Arc<dyn ScanStore>,
        local_fallback: Option<Arc<dyn ScanStore>>,
        options: SessionOptions,
    ) -> SessionController {
        SessionController::new(
            SessionServices {
                media: Box::new(camera),
                extractor,
                interpreter: InterpretationClient::new(Arc::new(CannedInterpreter)),
                store,
                local_fallback,
            },
            options,
        )
    }

    fn live_controller(camera: SyntheticCamera, extractor: Arc<dyn VitalsExtractor>) -> SessionController {
        controller_with(
            camera,
            extractor,
            MemoryStore::new(StorageBadge::Cloud, true),
            None,
            SessionOptions::default(),
        )
    }

    async fn wait_for(
        events: &mut broadcast::Receiver<SessionState>,
        matches: impl Fn(&SessionState) -> bool,
    ) -> SessionState {
        loop {
            let state = events.recv().await.unwrap();
            if matches(&state) {
                return state;
            }
        }
    }

    async fn wait_for_end(events: &mut broadcast::Receiver<SessionState>) -> SessionState {
        wait_for(events, SessionState::is_terminal).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_auto_stops_at_fifteen_seconds() {
        let extractor = Arc::new(FakeExtractor::returning(good_vitals()));
        let calls = Arc::clone(&extractor.calls);
        let mut controller = live_controller(SyntheticCamera::new(), extractor);
        let mut events = controller.subscribe();

        let started = Instant::now();
        assert!(controller.start());

        let last_tick = wait_for(&mut events, |s| {
            matches!(s, SessionState::Capturing { elapsed_seconds } if *elapsed_seconds == RECORDING_CEILING_SECS)
        })
        .await;
        assert_eq!(
            last_tick,
            SessionState::Capturing {
                elapsed_seconds: 15
            }
        );

        wait_for(&mut events, |s| *s == SessionState::Processing).await;
        assert_eq!(started.elapsed(), Duration::from_secs(RECORDING_CEILING_SECS));

        let SessionState::Result(completed) = wait_for_end(&mut events).await else {
            panic!("expected a result");
        };
        assert_eq!(completed.result.heart_rate, 71.6);
        assert_eq!(completed.storage, StorageBadge::Cloud);
        assert_eq!(completed.interpretation_source, InterpretationSource::Remote);
        assert_eq!(completed.report.status(), Some(("OPTIMAL", Severity::Positive)));

        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0 > 0);
        assert!(!calls[0].1);

        // Nothing left to stop
        assert!(!controller.request_stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_stop_ends_recording_early() {
        let mut controller = live_controller(
            SyntheticCamera::new(),
            Arc::new(FakeExtractor::returning(good_vitals())),
        );
        let mut events = controller.subscribe();
        assert!(controller.start());

        wait_for(&mut events, |s| {
            matches!(s, SessionState::Capturing { elapsed_seconds: 3 })
        })
        .await;
        let stopped_at = Instant::now();
        assert!(controller.request_stop());

        wait_for(&mut events, |s| *s == SessionState::Processing).await;
        assert_eq!(stopped_at.elapsed(), Duration::ZERO);
        assert!(matches!(
            wait_for_end(&mut events).await,
            SessionState::Result(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_pulse_ends_in_error() {
        let mut controller = live_controller(
            SyntheticCamera::new(),
            Arc::new(FakeExtractor::returning(json!({"hrv": 40, "stress_index": 5}))),
        );
        let mut events = controller.subscribe();
        controller.start();

        let SessionState::Error { message } = wait_for_end(&mut events).await else {
            panic!("expected an error");
        };
        assert!(message.contains("No pulse detected"));
        assert_eq!(controller.snapshot(), SessionState::Error { message });
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_ends_in_error() {
        let mut controller = live_controller(
            SyntheticCamera::new().deny_permission(),
            Arc::new(FakeExtractor::returning(good_vitals())),
        );
        let mut events = controller.subscribe();
        let started = Instant::now();
        controller.start();

        let SessionState::Error { message } = wait_for_end(&mut events).await else {
            panic!("expected an error");
        };
        assert!(message.contains("permission denied"));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_carries_hint() {
        let mut controller = live_controller(SyntheticCamera::new(), Arc::new(FailingExtractor));
        let mut events = controller.subscribe();
        controller.start();

        let SessionState::Error { message } = wait_for_end(&mut events).await else {
            panic!("expected an error");
        };
        assert!(message.contains("CORS"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_camera_ends_in_error() {
        let mut controller = live_controller(
            SyntheticCamera::new().with_bytes_per_tick(0),
            Arc::new(FakeExtractor::returning(good_vitals())),
        );
        let mut events = controller.subscribe();
        controller.start();

        let SessionState::Error { message } = wait_for_end(&mut events).await else {
            panic!("expected an error");
        };
        assert_eq!(message, AppError::EmptyCapture.to_string());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_not_reentrant() {
        let mut controller = live_controller(SyntheticCamera::new(), Arc::new(SlowExtractor));
        let mut events = controller.subscribe();

        assert!(controller.start());
        assert!(!controller.start());
        assert!(!controller.set_options(SessionOptions {
            simulation: true,
            use_proxy: false,
        }));

        controller.request_stop();
        wait_for(&mut events, |s| *s == SessionState::Processing).await;
        assert!(!controller.start());
        assert!(!controller.clear().await);

        wait_for_end(&mut events).await;
        assert!(controller.retry().await);
        assert!(controller.snapshot().is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_uses_synthetic_vitals() {
        let camera = SyntheticCamera::new();
        let releases = camera.release_counter();
        let extractor = Arc::new(VitalsClient::new(ServiceEndpoints::new(
            "http://127.0.0.1:9",
        )));
        let mut controller = controller_with(
            camera,
            extractor,
            MemoryStore::new(StorageBadge::Cloud, true),
            None,
            SessionOptions {
                simulation: true,
                use_proxy: false,
            },
        );
        let mut events = controller.subscribe();
        controller.start();

        wait_for(&mut events, |s| {
            matches!(s, SessionState::Capturing { elapsed_seconds: 2 })
        })
        .await;
        controller.request_stop();

        let SessionState::Result(completed) = wait_for_end(&mut events).await else {
            panic!("expected a result");
        };
        assert_eq!(completed.result.heart_rate, 72.0);
        assert_eq!(completed.result.hrv, 48.0);
        assert_eq!(
            completed.result.blood_pressure,
            BloodPressure {
                systolic: 118.0,
                diastolic: 76.0
            }
        );
        // The camera was never opened, so there was nothing to release
        assert_eq!(*releases.lock(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_still_shows_result() {
        let local = MemoryStore::new(StorageBadge::Local, true);
        let mut controller = controller_with(
            SyntheticCamera::new(),
            Arc::new(FakeExtractor::returning(good_vitals())),
            MemoryStore::new(StorageBadge::Cloud, false),
            Some(local.clone()),
            SessionOptions::default(),
        );
        let mut events = controller.subscribe();
        controller.start();
        controller.request_stop();

        let SessionState::Result(completed) = wait_for_end(&mut events).await else {
            panic!("expected a result");
        };
        assert_eq!(completed.storage, StorageBadge::Local);
        assert_eq!(local.saved.lock()[0].id, completed.result.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_resets_and_releases_camera() {
        let camera = SyntheticCamera::new();
        let releases = camera.release_counter();
        let mut controller = live_controller(
            camera,
            Arc::new(FakeExtractor::returning(good_vitals())),
        );
        let mut events = controller.subscribe();

        assert!(!controller.clear().await);
        controller.start();
        wait_for_end(&mut events).await;
        assert_eq!(*releases.lock(), 1);

        assert!(controller.clear().await);
        assert_eq!(controller.snapshot(), SessionState::Idle);
        assert_eq!(*releases.lock(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_camera_mid_recording() {
        let camera = SyntheticCamera::new();
        let releases = camera.release_counter();
        let mut controller = live_controller(
            camera,
            Arc::new(FakeExtractor::returning(good_vitals())),
        );
        let mut events = controller.subscribe();
        controller.start();
        wait_for(&mut events, |s| {
            matches!(s, SessionState::Capturing { elapsed_seconds: 1 })
        })
        .await;

        controller.shutdown().await;
        assert_eq!(*releases.lock(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_polling_runs_alongside_capture() {
        let service = Arc::new(FlakyService::default());
        let mut controller = live_controller(
            SyntheticCamera::new(),
            Arc::new(FakeExtractor::returning(good_vitals())),
        );
        let mut events = controller.subscribe();
        controller.start_health_polling(service.clone());
        assert!(controller.start());

        wait_for(&mut events, |s| {
            matches!(s, SessionState::Capturing { elapsed_seconds: 2 })
        })
        .await;
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert!(controller.service_status().unwrap().ok);

        // The 10 s poll lands mid-recording without disturbing the session
        wait_for(&mut events, |s| {
            matches!(s, SessionState::Capturing { elapsed_seconds: 12 })
        })
        .await;
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
        let status = controller.service_status().unwrap();
        assert!(!status.ok);
        assert_eq!(status.error_type, Some(HealthErrorType::Network));

        let end = wait_for_end(&mut events).await;
        assert!(matches!(end, SessionState::Result(_)));
        assert_eq!(controller.snapshot().label(), "result");
        assert!(!controller.service_status().unwrap().ok);
    }
}
