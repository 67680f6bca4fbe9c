//! Session state machine types

use crate::interpretation::InterpretationSource;
use crate::report::Report;
use crate::storage::{ScanResult, StorageBadge};
use crate::vitals::ScanMode;
use serde::Serialize;

/// Per-session switches chosen by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    /// Skip the camera and the extraction service
    pub simulation: bool,
    /// Route service calls through the configured proxy
    pub use_proxy: bool,
}

impl SessionOptions {
    pub fn mode(&self) -> ScanMode {
        ScanMode::from_simulation(self.simulation)
    }
}

/// Everything the result view needs once a session completes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedScan {
    pub result: ScanResult,
    pub report: Report,
    pub storage: StorageBadge,
    pub interpretation_source: InterpretationSource,
}

/// `Idle → Capturing → Processing → Result | Error`, back to `Idle` on clear
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    #[default]
    Idle,
    #[serde(rename_all = "camelCase")]
    Capturing { elapsed_seconds: u64 },
    Processing,
    Result(Box<CompletedScan>),
    Error { message: String },
}

impl SessionState {
    /// A session is in flight; new starts are refused
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SessionState::Capturing { .. } | SessionState::Processing
        )
    }

    /// The session has ended and is waiting to be cleared
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Result(_) | SessionState::Error { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Capturing { .. } => "capturing",
            SessionState::Processing => "processing",
            SessionState::Result(_) => "result",
            SessionState::Error { .. } => "error",
        }
    }
}
