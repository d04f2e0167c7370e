//! Periodic full-tree rescans.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing;

use filehub_entity::PortablePath;

use crate::dispatcher::{JobDispatcher, JobHandle};
use crate::jobs::SCAN_DIRECTORY;

/// Dispatches a scan of one directory every `interval`, skipping a tick
/// while the previous scan is still running.
#[derive(Debug)]
pub struct RescanScheduler {
    dispatcher: Arc<JobDispatcher>,
    interval: Duration,
    path: PortablePath,
}

impl RescanScheduler {
    pub fn new(dispatcher: Arc<JobDispatcher>, interval: Duration, path: PortablePath) -> Self {
        Self {
            dispatcher,
            interval,
            path,
        }
    }

    /// Run until `shutdown` turns true, then cancel and await the scan in flight.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires at once; the tree was reconciled on open.
        ticker.tick().await;
        tracing::info!(
            interval_seconds = self.interval.as_secs(),
            path = %self.path,
            "Rescan scheduler started"
        );

        let mut current: Option<JobHandle> = None;
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if current.as_ref().is_some_and(|h| !h.is_finished()) {
                        tracing::debug!("Previous rescan still running, skipping");
                        continue;
                    }
                    let payload = serde_json::json!({ "path": self.path.to_string() });
                    match self.dispatcher.dispatch(SCAN_DIRECTORY, payload) {
                        Ok(handle) => current = Some(handle),
                        Err(e) => tracing::error!(error = %e, "Failed to dispatch rescan"),
                    }
                }
            }
        }

        if let Some(handle) = current {
            handle.cancel();
            let _ = handle.wait().await;
        }
        tracing::info!("Rescan scheduler shut down");
    }
}
