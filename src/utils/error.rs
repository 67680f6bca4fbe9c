//! Error types and handling
//!
//! Common error types used across the scan pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hint appended to extraction failures that look like connectivity problems.
pub const NETWORK_HINT: &str = "Check that the vitals extraction endpoint (/analyze-video) is reachable \
and accepts cross-origin requests (CORS), or enable the proxy route and retry.";

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("Camera error: {0}")]
    Device(String),

    #[error("No video data was captured. Keep your face in frame and try again.")]
    EmptyCapture,

    #[error("Vitals extraction failed: {0}")]
    Extraction(String),

    #[error("Interpretation timed out after {0}ms")]
    InterpretationTimeout(u64),

    #[error("Interpretation failed: {0}")]
    Interpretation(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Whether the failure text points at a connectivity problem rather than a bad payload.
    pub fn is_network_failure(&self) -> bool {
        let text = self.to_string().to_lowercase();
        ["network", "connect", "timed out", "dns", "cors", "error sending request"]
            .iter()
            .any(|needle| text.contains(needle))
    }

    /// Message shown to the end user when a session ends in the error state.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Extraction(_) if self.is_network_failure() => {
                format!("{} {}", self, NETWORK_HINT)
            }
            _ => self.to_string(),
        }
    }
}

/// Error response for frontend
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::Device(_) => "DEVICE_ERROR",
            AppError::EmptyCapture => "EMPTY_CAPTURE",
            AppError::Extraction(_) => "EXTRACTION_FAILURE",
            AppError::InterpretationTimeout(_) => "INTERPRETATION_TIMEOUT",
            AppError::Interpretation(_) => "INTERPRETATION_FAILURE",
            AppError::Persistence(_) => "PERSISTENCE_FAILURE",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::Config(_) => "CONFIG_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.user_message(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_failures_get_hint() {
        let err = AppError::Extraction("network error: error sending request".to_string());
        let message = err.user_message();
        assert!(message.contains("CORS"));
        assert!(message.starts_with("Vitals extraction failed"));
    }

    #[test]
    fn test_payload_failures_are_verbatim() {
        let err = AppError::Extraction("No pulse detected in the video".to_string());
        assert_eq!(err.user_message(), err.to_string());
        assert!(!err.user_message().contains(NETWORK_HINT));
    }

    #[test]
    fn test_error_response_codes() {
        let response = ErrorResponse::from(AppError::EmptyCapture);
        assert_eq!(response.code, "EMPTY_CAPTURE");

        let response = ErrorResponse::from(AppError::PermissionDenied("blocked".into()));
        assert_eq!(response.code, "PERMISSION_DENIED");
        assert!(response.message.contains("blocked"));
    }
}
