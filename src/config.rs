//! Runtime configuration
//!
//! Every option can come from a flag or a `VITALSCAN_*` environment variable.
//! Timing constants are compile-time and not configurable.

use crate::session::SessionOptions;
use crate::utils::{AppError, AppResult};
use crate::vitals::client::{DEFAULT_ANALYZE_PATH, DEFAULT_HEALTH_PATH};
use crate::vitals::ServiceEndpoints;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// Which media source records the clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CameraBackend {
    /// Generated frames, no hardware needed
    Synthetic,
    /// A local webcam encoded through FFmpeg
    Native,
}

#[derive(Args, Debug, Clone)]
pub struct ScanConfig {
    /// Base URL of the vitals extraction service
    #[arg(long, env = "VITALSCAN_VITALS_URL", default_value = "http://localhost:8000")]
    pub vitals_url: String,

    /// Extraction path on the vitals service
    #[arg(long, env = "VITALSCAN_ANALYZE_PATH", default_value = DEFAULT_ANALYZE_PATH)]
    pub analyze_path: String,

    /// Health path on the vitals service
    #[arg(long, env = "VITALSCAN_HEALTH_PATH", default_value = DEFAULT_HEALTH_PATH)]
    pub health_path: String,

    /// Proxy route taking the target as `?url=`
    #[arg(long, env = "VITALSCAN_PROXY_URL")]
    pub proxy_url: Option<String>,

    /// Send service calls through the proxy route
    #[arg(long, env = "VITALSCAN_USE_PROXY")]
    pub use_proxy: bool,

    /// Interpretation endpoint
    #[arg(
        long,
        env = "VITALSCAN_INTERPRET_URL",
        default_value = "http://localhost:3000/api/interpret"
    )]
    pub interpret_url: String,

    /// Cloud store endpoint; scans stay local when unset
    #[arg(long, env = "VITALSCAN_STORAGE_URL")]
    pub storage_url: Option<String>,

    /// Directory for local scan history
    #[arg(long, env = "VITALSCAN_HISTORY_DIR", default_value = "scan-history")]
    pub history_dir: PathBuf,

    /// Run without camera or extraction service
    #[arg(long, env = "VITALSCAN_SIMULATE")]
    pub simulate: bool,

    #[arg(long, value_enum, env = "VITALSCAN_CAMERA", default_value = "synthetic")]
    pub camera: CameraBackend,

    /// Camera device index for the native backend
    #[arg(long, env = "VITALSCAN_DEVICE")]
    pub device: Option<String>,
}

fn check_url(name: &str, url: &str) -> AppResult<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "{} must be an http(s) URL, got '{}'",
            name, url
        )))
    }
}

impl ScanConfig {
    pub fn validate(&self) -> AppResult<()> {
        check_url("vitals URL", &self.vitals_url)?;
        check_url("interpretation URL", &self.interpret_url)?;
        if let Some(url) = &self.proxy_url {
            check_url("proxy URL", url)?;
        }
        if let Some(url) = &self.storage_url {
            check_url("storage URL", url)?;
        }

        for (name, path) in [
            ("analyze path", &self.analyze_path),
            ("health path", &self.health_path),
        ] {
            if !path.starts_with('/') {
                return Err(AppError::Config(format!(
                    "{} must start with '/', got '{}'",
                    name, path
                )));
            }
        }

        if self.use_proxy && self.proxy_url.is_none() {
            return Err(AppError::Config(
                "--use-proxy needs --proxy-url".to_string(),
            ));
        }

        if self.camera == CameraBackend::Native && !cfg!(feature = "native-camera") {
            return Err(AppError::Config(
                "native camera support was not compiled in (enable the `native-camera` feature)"
                    .to_string(),
            ));
        }

        Ok(())
    }

    pub fn endpoints(&self) -> ServiceEndpoints {
        let mut endpoints = ServiceEndpoints::new(self.vitals_url.clone());
        endpoints.analyze_path = self.analyze_path.clone();
        endpoints.health_path = self.health_path.clone();
        match &self.proxy_url {
            Some(proxy) => endpoints.with_proxy(proxy.clone()),
            None => endpoints,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            simulation: self.simulate,
            use_proxy: self.use_proxy,
        }
    }
}
