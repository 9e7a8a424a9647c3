use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::errors::ErrorCode;
use crate::registry::{HealthState, HealthStatus, ServiceRegistry};

/// Background worker probing the health check URL of registered services
///
/// A healthy answer counts as a heartbeat. A failing check only updates the
/// health, so an instance whose URL stays dead still expires with its TTL.
pub struct HealthProber {
    registry: Arc<ServiceRegistry>,
    client: reqwest::Client,
    check_interval: Duration,
    max_concurrent_probes: usize,
}

impl HealthProber {
    /// Create a new prober whose requests are bounded by `probe_timeout`
    pub fn new(
        registry: Arc<ServiceRegistry>,
        check_interval: Duration,
        probe_timeout: Duration,
        max_concurrent_probes: usize,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(probe_timeout).build()?;

        Ok(Self {
            registry,
            client,
            check_interval,
            max_concurrent_probes: max_concurrent_probes.max(1),
        })
    }

    /// Probe every `check_interval` until the shutdown channel flips to true
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            "Health prober started: interval={}s, max concurrent probes={}",
            self.check_interval.as_secs(),
            self.max_concurrent_probes
        );

        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_all().await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Health prober stopped");
    }

    /// Probe all targets once
    ///
    /// # Concurrency Model
    /// - Each probe runs in its own task
    /// - A permit is acquired before spawning, bounding in-flight probes
    /// - The permit is released when the probe result has been recorded
    pub async fn probe_all(&self) {
        let targets = self.registry.probe_targets().await;
        if targets.is_empty() {
            debug!("Health prober has no targets");
            return;
        }

        debug!("Health prober checking {} services", targets.len());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_probes));
        let mut tasks = JoinSet::new();

        for (id, url) in targets {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Health prober failed to acquire semaphore: {:?}", e);
                    break;
                }
            };

            let client = self.client.clone();
            let registry = self.registry.clone();

            tasks.spawn(async move {
                let health = probe(&client, &url).await;
                match registry.record_check_result(&id, health).await {
                    Ok(_) => {}
                    Err(e) if e.code == ErrorCode::NotFound => {
                        debug!("Service {} went away while being probed", id);
                    }
                    Err(e) => error!("Failed to record health of {}: {}", id, e),
                }
                drop(permit);
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Health probe task panicked: {:?}", e);
            }
        }
    }
}

/// Issue one GET against `url` and translate the outcome into a health status
pub async fn probe(client: &reqwest::Client, url: &str) -> HealthStatus {
    match client.get(url).send().await {
        Ok(response) => {
            let code = response.status().as_u16();
            let state = state_for_status(code);
            if state != HealthState::Healthy {
                warn!("Health check {} returned HTTP {}", url, code);
            }
            HealthStatus::new(state, format!("HTTP {}", code)).with_detail("http", code.to_string())
        }
        Err(e) => {
            let reason = if e.is_timeout() { "timeout" } else { "unreachable" };
            warn!("Health check {} failed: {}", url, e);
            HealthStatus::unhealthy(e.to_string()).with_detail("http", reason)
        }
    }
}

/// Any 2xx answer counts as healthy
pub fn state_for_status(code: u16) -> HealthState {
    if (200..300).contains(&code) {
        HealthState::Healthy
    } else {
        HealthState::Unhealthy
    }
}
