//! Extraction service health checks

use super::client::VitalsClient;
use super::types::ScanMode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A health probe that takes longer than this counts as a network failure
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Broad cause of a failed health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthErrorType {
    /// The service answered but refused the request origin
    Cors,
    /// The service could not be reached
    Network,
    Other,
}

/// Last known health of the extraction service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<HealthErrorType>,
    pub raw_error: Option<String>,
}

impl ServiceStatus {
    pub fn online(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            error_type: None,
            raw_error: None,
        }
    }

    pub fn failed(
        error_type: HealthErrorType,
        message: impl Into<String>,
        raw_error: impl Into<String>,
    ) -> Self {
        Self {
            ok: false,
            message: message.into(),
            error_type: Some(error_type),
            raw_error: Some(raw_error.into()),
        }
    }
}

/// Something that can report the extraction service's health
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check_health(&self, mode: ScanMode, use_proxy: bool) -> ServiceStatus;
}

fn classify_request_error(error: &reqwest::Error) -> HealthErrorType {
    if error.is_connect() || error.is_timeout() || error.is_request() {
        HealthErrorType::Network
    } else {
        HealthErrorType::Other
    }
}

#[async_trait]
impl HealthProbe for VitalsClient {
    async fn check_health(&self, mode: ScanMode, use_proxy: bool) -> ServiceStatus {
        if mode.is_simulation() {
            return ServiceStatus::online("Simulation mode: vitals service not required");
        }

        let url = match self.endpoints.route(&self.endpoints.health_path, use_proxy) {
            Ok(url) => url,
            Err(e) => {
                return ServiceStatus::failed(
                    HealthErrorType::Other,
                    "Health check is misconfigured",
                    e.to_string(),
                )
            }
        };

        let response = match self.http.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response,
            Err(e) => {
                let error_type = classify_request_error(&e);
                tracing::debug!("Health check of {} failed: {}", url, e);
                return ServiceStatus::failed(
                    error_type,
                    "Vitals service unreachable. Check your connection or enable the proxy.",
                    e.to_string(),
                );
            }
        };

        let status = response.status();
        if status.is_success() {
            return ServiceStatus::online("Vitals service online");
        }

        let body = response.text().await.unwrap_or_default();
        let raw_error = format!("{}: {}", status, body.trim());
        if status == reqwest::StatusCode::FORBIDDEN {
            ServiceStatus::failed(
                HealthErrorType::Cors,
                "Vitals service rejected this origin (CORS). Enable the proxy route.",
                raw_error,
            )
        } else {
            ServiceStatus::failed(
                HealthErrorType::Other,
                format!("Vitals service unhealthy ({})", status.as_u16()),
                raw_error,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{closed_port_url, serve_once};
    use crate::vitals::ServiceEndpoints;

    #[tokio::test]
    async fn test_simulation_is_always_online() {
        let client = VitalsClient::new(ServiceEndpoints::new("http://192.0.2.1:1"));
        let status = client.check_health(ScanMode::Simulation, false).await;
        assert!(status.ok);
        assert_eq!(status.error_type, None);
    }

    #[tokio::test]
    async fn test_healthy_service() {
        let server = serve_once(200, "application/json", r#"{"status":"ok"}"#).await;
        let client = VitalsClient::new(ServiceEndpoints::new(server.base_url.clone()));

        let status = client.check_health(ScanMode::Live, false).await;
        assert!(status.ok);
        assert!(server.request().await.starts_with("GET /health"));
    }

    #[tokio::test]
    async fn test_forbidden_origin_is_cors() {
        let server = serve_once(403, "text/plain", "origin not allowed").await;
        let client = VitalsClient::new(ServiceEndpoints::new(server.base_url.clone()));

        let status = client.check_health(ScanMode::Live, false).await;
        assert!(!status.ok);
        assert_eq!(status.error_type, Some(HealthErrorType::Cors));
        assert!(status.raw_error.unwrap().contains("origin not allowed"));
    }

    #[tokio::test]
    async fn test_unreachable_is_network() {
        let client = VitalsClient::new(ServiceEndpoints::new(closed_port_url().await));
        let status = client.check_health(ScanMode::Live, false).await;
        assert!(!status.ok);
        assert_eq!(status.error_type, Some(HealthErrorType::Network));
    }

    #[test]
    fn test_status_serialization() {
        let status = ServiceStatus::failed(HealthErrorType::Cors, "blocked", "403");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["errorType"], "CORS");
        assert_eq!(json["rawError"], "403");
    }
}
