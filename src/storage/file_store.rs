//! Local scan store
//!
//! One JSON document per scan under a history directory. Writes go through a
//! temp file in the same directory and are renamed into place, so a reader
//! never sees a half-written document.

use super::schema::{ScanResult, StorageBadge, StoredScan};
use super::ScanStore;
use crate::utils::{AppError, AppResult};
use crate::vitals::ScanMode;
use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

/// Extension of stored scan documents
pub const SCAN_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileScanStore {
    dir: PathBuf,
}

impl FileScanStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("scan-{}.{}", id, SCAN_EXTENSION))
    }

    /// Write a scan document, returning its path
    pub fn write_scan(&self, scan: &ScanResult, mode: ScanMode) -> AppResult<PathBuf> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }

        let document = StoredScan {
            mode,
            saved_at: Utc::now(),
            scan: scan.clone(),
        };
        let content = serde_json::to_string_pretty(&document)?;

        let path = self.path_for(&scan.id);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(&path).map_err(|e| AppError::Io(e.error))?;

        tracing::debug!("Saved scan {} to {:?}", scan.id, path);
        Ok(path)
    }

    /// Read one stored scan by id
    pub fn read_scan(&self, id: &Uuid) -> AppResult<StoredScan> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(AppError::Persistence(format!("scan {} not found", id)));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// All stored scans, newest first. Unreadable documents are skipped.
    pub fn load_history(&self) -> AppResult<Vec<StoredScan>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut scans = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SCAN_EXTENSION) {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(AppError::from)
                .and_then(|content| Ok(serde_json::from_str::<StoredScan>(&content)?))
            {
                Ok(scan) => scans.push(scan),
                Err(e) => tracing::warn!("Skipping unreadable scan {:?}: {}", path, e),
            }
        }

        scans.sort_by(|a, b| b.scan.timestamp.cmp(&a.scan.timestamp));
        Ok(scans)
    }
}

#[async_trait]
impl ScanStore for FileScanStore {
    fn badge(&self) -> StorageBadge {
        StorageBadge::Local
    }

    async fn save_scan_result(&self, scan: &ScanResult, mode: ScanMode) -> bool {
        let store = self.clone();
        let scan = scan.clone();
        let written = tokio::task::spawn_blocking(move || store.write_scan(&scan, mode)).await;

        match written {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::warn!("Local save failed: {}", e);
                false
            }
            Err(e) => {
                tracing::warn!("Local save task failed: {}", e);
                false
            }
        }
    }
}
