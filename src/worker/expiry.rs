use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use crate::registry::ServiceRegistry;

/// Background worker removing instances whose TTL elapsed
pub struct ExpirySweeper {
    registry: Arc<ServiceRegistry>,
    check_interval: Duration,
}

impl ExpirySweeper {
    pub fn new(registry: Arc<ServiceRegistry>, check_interval: Duration) -> Self {
        Self {
            registry,
            check_interval,
        }
    }

    /// Sweep every `check_interval` until the shutdown channel flips to true
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            "Expiry sweeper started, checking every {}s",
            self.check_interval.as_secs()
        );

        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Expiry sweeper stopped");
    }

    /// Run a single sweep, returning the number of removed instances
    pub async fn sweep(&self) -> usize {
        let expired = self.registry.expire_stale().await;
        if expired.is_empty() {
            debug!("Expiry sweeper found no stale services");
        } else {
            info!(
                "Expiry sweeper removed {} stale services: {}",
                expired.len(),
                expired.join(", ")
            );
        }
        expired.len()
    }
}
