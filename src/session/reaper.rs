//! Background sweep that expires idle and draining sessions

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::debug;

use super::SessionRegistry;

/// Spawn a task that calls [`SessionRegistry::reap`] every `interval`
pub fn spawn_reaper(registry: Arc<SessionRegistry>, interval: Duration) -> JoinHandle<()> {
    // tokio intervals must be non-zero
    let interval = interval.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = registry.reap(Instant::now());
            if !report.is_empty() {
                debug!(
                    drained = report.drained,
                    closed = report.closed,
                    forgotten = report.forgotten,
                    "reaper sweep"
                );
            }
        }
    })
}
