//! Background health polling
//!
//! Lives as long as the scan view does. The first probe runs immediately,
//! then every 10 seconds; dropping the monitor stops polling.

use super::state::SessionOptions;
use crate::vitals::{HealthProbe, ServiceStatus};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub struct HealthMonitor {
    status: Arc<RwLock<Option<ServiceStatus>>>,
    task: JoinHandle<()>,
}

impl HealthMonitor {
    /// Start polling `probe`. Options are read on every poll so a mode switch
    /// takes effect on the next check.
    pub fn spawn(probe: Arc<dyn HealthProbe>, options: Arc<RwLock<SessionOptions>>) -> Self {
        let status = Arc::new(RwLock::new(None));
        let task = tokio::spawn(poll(probe, options, Arc::clone(&status)));
        Self { status, task }
    }

    /// Last reported status; `None` until the first probe completes
    pub fn status(&self) -> Option<ServiceStatus> {
        self.status.read().clone()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn poll(
    probe: Arc<dyn HealthProbe>,
    options: Arc<RwLock<SessionOptions>>,
    status: Arc<RwLock<Option<ServiceStatus>>>,
) {
    let mut interval = tokio::time::interval(HEALTH_POLL_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let current = *options.read();
        let checked = probe.check_health(current.mode(), current.use_proxy).await;
        if checked.ok {
            tracing::debug!("Vitals service healthy: {}", checked.message);
        } else {
            tracing::warn!(
                "Vitals service unhealthy ({:?}): {}",
                checked.error_type,
                checked.message
            );
        }
        *status.write() = Some(checked);
    }
}
