//! Scan persistence
//!
//! A completed scan is handed to a [`ScanStore`]. Saving reports success as a
//! plain bool because a failed save never blocks showing the result.

pub mod file_store;
pub mod remote;
pub mod schema;

pub use file_store::FileScanStore;
pub use remote::RemoteScanStore;
pub use schema::{ScanResult, StorageBadge, StoredScan, StressLevel};

use crate::vitals::ScanMode;
use async_trait::async_trait;

/// Persistence collaborator
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Badge shown when a save to this store succeeds
    fn badge(&self) -> StorageBadge;

    async fn save_scan_result(&self, scan: &ScanResult, mode: ScanMode) -> bool;
}
