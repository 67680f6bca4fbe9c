//! vitalscan - face-video vital sign scans, interpreted.
//!
//! Records a short face clip, sends it to a vitals extraction service,
//! asks an interpreter for a clinical reading under a hard deadline and
//! turns the reading into renderable report blocks.

pub mod capture;
pub mod config;
pub mod interpretation;
pub mod recorder;
pub mod report;
pub mod session;
pub mod storage;
pub mod utils;
pub mod vitals;

#[cfg(test)]
mod test_support;

use capture::{CameraInfo, MediaSource, SyntheticCamera};
use config::{CameraBackend, ScanConfig};
use interpretation::{HttpInterpreter, InterpretationClient};
use session::{SessionController, SessionServices};
use std::sync::Arc;
use storage::{FileScanStore, RemoteScanStore, ScanStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utils::AppResult;
use vitals::VitalsClient;

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vitalscan=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn media_source(config: &ScanConfig) -> AppResult<Box<dyn MediaSource>> {
    match config.camera {
        CameraBackend::Synthetic => Ok(Box::new(SyntheticCamera::new())),
        #[cfg(feature = "native-camera")]
        CameraBackend::Native => Ok(Box::new(capture::WebcamSource::new(config.device.clone()))),
        #[cfg(not(feature = "native-camera"))]
        CameraBackend::Native => Err(utils::AppError::Config(
            "native camera support was not compiled in".to_string(),
        )),
    }
}

/// Cameras the configured backend can record from
pub fn list_cameras(config: &ScanConfig) -> AppResult<Vec<CameraInfo>> {
    match config.camera {
        CameraBackend::Synthetic => Ok(vec![SyntheticCamera::new().info()]),
        #[cfg(feature = "native-camera")]
        CameraBackend::Native => Ok(capture::list_cameras()),
        #[cfg(not(feature = "native-camera"))]
        CameraBackend::Native => Err(utils::AppError::Config(
            "native camera support was not compiled in".to_string(),
        )),
    }
}

/// Wire a session controller from configuration
pub fn build_controller(config: &ScanConfig) -> AppResult<SessionController> {
    config.validate()?;

    let local: Arc<dyn ScanStore> = Arc::new(FileScanStore::new(config.history_dir.clone()));
    let (store, local_fallback) = match &config.storage_url {
        Some(url) => {
            let remote: Arc<dyn ScanStore> = Arc::new(RemoteScanStore::new(url.clone()));
            (remote, Some(local))
        }
        None => (local, None),
    };

    let services = SessionServices {
        media: media_source(config)?,
        extractor: Arc::new(VitalsClient::new(config.endpoints())),
        interpreter: InterpretationClient::new(Arc::new(HttpInterpreter::new(
            config.interpret_url.clone(),
        ))),
        store,
        local_fallback,
    };

    tracing::info!(
        "Scan pipeline ready (vitals {}, simulation {})",
        config.vitals_url,
        config.simulate
    );
    Ok(SessionController::new(services, config.session_options()))
}
