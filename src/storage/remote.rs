//! Remote scan store
//!
//! Posts each completed scan as JSON to the persistence endpoint.

use super::schema::{ScanResult, StorageBadge};
use super::ScanStore;
use crate::utils::{AppError, AppResult};
use crate::vitals::client::describe_request_error;
use crate::vitals::ScanMode;
use async_trait::async_trait;
use std::time::Duration;

/// Header carrying the scan mode alongside the document
pub const SCAN_MODE_HEADER: &str = "X-Scan-Mode";

const SAVE_TIMEOUT: Duration = Duration::from_secs(15);

pub struct RemoteScanStore {
    http: reqwest::Client,
    url: String,
}

impl RemoteScanStore {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    async fn post(&self, scan: &ScanResult, mode: ScanMode) -> AppResult<()> {
        let response = self
            .http
            .post(&self.url)
            .header(SCAN_MODE_HEADER, mode.as_str())
            .timeout(SAVE_TIMEOUT)
            .json(scan)
            .send()
            .await
            .map_err(|e| AppError::Persistence(describe_request_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Persistence(format!(
                "store returned {}",
                status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ScanStore for RemoteScanStore {
    fn badge(&self) -> StorageBadge {
        StorageBadge::Cloud
    }

    async fn save_scan_result(&self, scan: &ScanResult, mode: ScanMode) -> bool {
        match self.post(scan, mode).await {
            Ok(()) => {
                tracing::info!("Scan {} saved to cloud store", scan.id);
                true
            }
            Err(e) => {
                tracing::warn!("Cloud save failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{closed_port_url, serve_once};
    use crate::vitals::VitalsRecord;

    fn scan() -> ScanResult {
        ScanResult::from_vitals(
            &VitalsRecord {
                heart_rate_bpm: 72.0,
                hrv_ms: 48.0,
                blood_pressure: Default::default(),
                stress_index: 32.0,
            },
            "text",
        )
    }

    #[tokio::test]
    async fn test_posts_camel_case_document() {
        let server = serve_once(201, "application/json", "{}").await;
        let store = RemoteScanStore::new(format!("{}/scans", server.base_url));

        assert!(store.save_scan_result(&scan(), ScanMode::Simulation).await);

        let request = server.request().await;
        assert!(request.starts_with("POST /scans"));
        assert!(request.to_lowercase().contains("x-scan-mode: simulation"));
        assert!(request.contains("\"aiInterpretation\":\"text\""));
        assert!(request.contains("\"stressLevel\":\"Normal\""));
    }

    #[tokio::test]
    async fn test_rejected_save_is_false() {
        let server = serve_once(500, "text/plain", "down").await;
        let store = RemoteScanStore::new(server.base_url.clone());
        assert!(!store.save_scan_result(&scan(), ScanMode::Live).await);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_false() {
        let store = RemoteScanStore::new(closed_port_url().await);
        assert!(!store.save_scan_result(&scan(), ScanMode::Live).await);
        assert_eq!(store.badge(), StorageBadge::Cloud);
    }
}
