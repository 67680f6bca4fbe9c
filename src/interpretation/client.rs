//! Interpretation client
//!
//! Asks the external interpreter for a clinical reading of a vitals record
//! under a hard deadline, falling back to the local template.

use super::deadline::{first_to_settle, Settled};
use super::fallback::fallback_report;
use crate::utils::{AppError, AppResult};
use crate::vitals::client::describe_request_error;
use crate::vitals::{BloodPressure, VitalsRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Hard deadline for the remote interpreter
pub const INTERPRETATION_DEADLINE: Duration = Duration::from_millis(8000);

/// Payload sent to the interpreter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretationPrompt {
    pub heart_rate: f64,
    pub hrv: f64,
    pub blood_pressure: BloodPressure,
}

impl From<&VitalsRecord> for InterpretationPrompt {
    fn from(vitals: &VitalsRecord) -> Self {
        Self {
            heart_rate: vitals.heart_rate_bpm,
            hrv: vitals.hrv_ms,
            blood_pressure: vitals.blood_pressure,
        }
    }
}

/// Remote service producing interpretation text
#[async_trait]
pub trait Interpreter: Send + Sync {
    async fn complete(&self, prompt: &InterpretationPrompt) -> AppResult<String>;
}

/// Interpreter reached over HTTP
pub struct HttpInterpreter {
    http: reqwest::Client,
    url: String,
}

impl HttpInterpreter {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

/// The body is either plain text or JSON carrying the text in a known field
fn extract_text(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            ["interpretation", "text", "content"]
                .iter()
                .find_map(|key| json.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl Interpreter for HttpInterpreter {
    async fn complete(&self, prompt: &InterpretationPrompt) -> AppResult<String> {
        let response = self
            .http
            .post(&self.url)
            .json(prompt)
            .send()
            .await
            .map_err(|e| AppError::Interpretation(describe_request_error(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Interpretation(e.to_string()))?;
        if !status.is_success() {
            return Err(AppError::Interpretation(format!(
                "interpreter returned {}: {}",
                status,
                body.trim()
            )));
        }

        Ok(extract_text(&body))
    }
}

/// Where an interpretation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpretationSource {
    Remote,
    Fallback,
}

/// Interpretation text plus its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interpretation {
    pub text: String,
    pub source: InterpretationSource,
    /// Why the fallback was used, if it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// Deadline-bounded interpretation with local fallback
#[derive(Clone)]
pub struct InterpretationClient {
    service: Arc<dyn Interpreter>,
}

impl InterpretationClient {
    pub fn new(service: Arc<dyn Interpreter>) -> Self {
        Self { service }
    }

    /// Interpret under the standard 8-second deadline. Never fails.
    pub async fn interpret(&self, vitals: &VitalsRecord) -> Interpretation {
        self.interpret_within(vitals, INTERPRETATION_DEADLINE).await
    }

    /// Interpret under `deadline`. Never fails.
    pub async fn interpret_within(&self, vitals: &VitalsRecord, deadline: Duration) -> Interpretation {
        let prompt = InterpretationPrompt::from(vitals);

        let failure = match first_to_settle(self.service.complete(&prompt), deadline).await {
            Settled::InTime(Ok(text)) if !text.trim().is_empty() => {
                tracing::info!("Remote interpretation received ({} chars)", text.len());
                return Interpretation {
                    text,
                    source: InterpretationSource::Remote,
                    fallback_reason: None,
                };
            }
            Settled::InTime(Ok(_)) => {
                AppError::Interpretation("interpreter returned an empty report".to_string())
            }
            Settled::InTime(Err(e)) => e,
            Settled::DeadlineElapsed => {
                AppError::InterpretationTimeout(deadline.as_millis() as u64)
            }
        };

        tracing::warn!("Using local interpretation: {}", failure);
        Interpretation {
            text: fallback_report(vitals),
            source: InterpretationSource::Fallback,
            fallback_reason: Some(failure.to_string()),
        }
    }
}
