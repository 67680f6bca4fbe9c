//! Vitals extraction client
//!
//! Posts a recorded clip to the external extraction service and normalizes
//! the answer. Simulation mode never touches the network.

use super::normalize::RawVitals;
use super::types::VitalsRecord;
use crate::recorder::ClipPayload;
use crate::utils::{AppError, AppResult};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Default extraction route, relative to the service base URL
pub const DEFAULT_ANALYZE_PATH: &str = "/analyze-video";

/// Default health route, relative to the service base URL
pub const DEFAULT_HEALTH_PATH: &str = "/health";

/// Upper bound for a single upload + analysis round trip
const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(120);

/// Response returned in simulation mode
fn simulated_response() -> RawVitals {
    RawVitals(json!({
        "heart_rate": 72,
        "hrv": 48,
        "blood_pressure": {"systolic": 118, "diastolic": 76},
        "stress_index": 32
    }))
}

/// Where the extraction service lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    /// Service base URL, e.g. `https://vitals.example.com`
    pub base_url: String,
    pub analyze_path: String,
    pub health_path: String,
    /// Proxy route taking the target as a `url` query parameter
    pub proxy_url: Option<String>,
}

impl ServiceEndpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            analyze_path: DEFAULT_ANALYZE_PATH.to_string(),
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            proxy_url: None,
        }
    }

    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    /// Resolve a service path, optionally through the proxy route
    pub fn route(&self, path: &str, use_proxy: bool) -> AppResult<String> {
        let target = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        if !use_proxy {
            return Ok(target);
        }

        let proxy = self.proxy_url.as_deref().ok_or_else(|| {
            AppError::Config("proxy route requested but no proxy URL is configured".to_string())
        })?;
        Ok(format!("{}?url={}", proxy, urlencoding::encode(&target)))
    }
}

/// Turns a recorded clip into canonical vitals
#[async_trait]
pub trait VitalsExtractor: Send + Sync {
    async fn extract(
        &self,
        payload: &ClipPayload,
        simulation: bool,
        use_proxy: bool,
    ) -> AppResult<VitalsRecord>;
}

/// HTTP client for the extraction service
#[derive(Clone)]
pub struct VitalsClient {
    pub(crate) http: reqwest::Client,
    pub(crate) endpoints: ServiceEndpoints,
}

impl VitalsClient {
    pub fn new(endpoints: ServiceEndpoints) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }

    /// Fetch the raw extractor response without normalizing it
    pub async fn extract_raw(
        &self,
        payload: &ClipPayload,
        simulation: bool,
        use_proxy: bool,
    ) -> AppResult<RawVitals> {
        if simulation {
            tracing::info!("Simulation mode, returning synthetic vitals");
            return Ok(simulated_response());
        }

        let (bytes, codec) = match payload {
            ClipPayload::Clip { bytes, codec } => (bytes, codec),
            ClipPayload::Simulated => {
                return Err(AppError::InvalidState(
                    "simulated payload cannot be sent to the live extractor".to_string(),
                ))
            }
        };
        if bytes.is_empty() {
            return Err(AppError::EmptyCapture);
        }

        let url = self.endpoints.route(&self.endpoints.analyze_path, use_proxy)?;
        tracing::info!("Uploading {} byte clip to {}", bytes.len(), url);

        let part = reqwest::multipart::Part::bytes(bytes.clone())
            .file_name(format!("scan.{}", codec.file_extension()))
            .mime_str(codec.container_mime_type())
            .map_err(|e| AppError::Extraction(format!("invalid clip type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("video", part);

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .timeout(EXTRACTION_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::Extraction(describe_request_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Extraction(format!(
                "extraction service returned {}: {}",
                status,
                body.trim()
            )));
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| AppError::Extraction(format!("invalid vitals response: {}", e)))?;
        tracing::debug!("Extractor response: {}", body);
        Ok(RawVitals(body))
    }
}

#[async_trait]
impl VitalsExtractor for VitalsClient {
    async fn extract(
        &self,
        payload: &ClipPayload,
        simulation: bool,
        use_proxy: bool,
    ) -> AppResult<VitalsRecord> {
        let record = self.extract_raw(payload, simulation, use_proxy).await?.normalize()?;
        tracing::info!(
            "Extracted vitals: {} bpm, hrv {}ms, bp {}, stress {}",
            record.rounded_heart_rate(),
            record.hrv_ms,
            record.blood_pressure.display(),
            record.stress_index
        );
        Ok(record)
    }
}

/// Describe a transport failure, flagging connectivity problems as network errors
pub(crate) fn describe_request_error(error: &reqwest::Error) -> String {
    if error.is_connect() || error.is_timeout() || error.is_request() {
        format!("network error: {}", error)
    } else {
        error.to_string()
    }
}
