use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use validator::Validate;

use super::models::{HealthState, HealthStatus, ServiceInfo, ServiceRegistration};
use super::policy::SelectionPolicy;
use crate::errors::{AppError, AppResult, ErrorCode};

/// Registry settings
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// How long an instance stays registered without a heartbeat
    pub ttl: Duration,
    pub selection_policy: SelectionPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            selection_policy: SelectionPolicy::First,
        }
    }
}

/// Aggregated view of the registry
#[derive(Debug, Serialize)]
pub struct RegistryStatus {
    pub total_services: usize,
    pub healthy_services: usize,
    pub unhealthy_services: usize,
    pub unknown_services: usize,
    pub services_by_name: BTreeMap<String, usize>,
    pub ttl_seconds: u64,
    pub selection_policy: SelectionPolicy,
    pub closed: bool,
}

struct Entry {
    /// Registration order, preserved across re-registration
    seq: u64,
    info: ServiceInfo,
}

/// In-memory registry of service instances
///
/// Instances are keyed by id. Every read skips instances whose heartbeat is
/// older than the TTL, the expiry sweeper removes them for good.
pub struct ServiceRegistry {
    config: RegistryConfig,
    ttl: chrono::Duration,
    services: RwLock<HashMap<String, Entry>>,
    next_seq: AtomicU64,
    cursor: AtomicUsize,
    closed: AtomicBool,
}

impl ServiceRegistry {
    /// Create a new registry
    ///
    /// # Returns
    /// - `Err(AppError)` with `Config` code when the TTL is zero or out of range
    pub fn new(config: RegistryConfig) -> AppResult<Self> {
        if config.ttl.is_zero() {
            return Err(AppError::config("Registry TTL must be greater than zero"));
        }

        let ttl = chrono::Duration::from_std(config.ttl)
            .map_err(|e| AppError::wrap(ErrorCode::Config, "Registry TTL is out of range", e))?;
        if Utc::now().checked_add_signed(ttl).is_none() {
            return Err(AppError::config("Registry TTL is out of range"));
        }

        info!(
            "Registry created: ttl={}s, selection_policy={}",
            config.ttl.as_secs(),
            config.selection_policy
        );

        Ok(Self {
            config,
            ttl,
            services: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            cursor: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop accepting registrations
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Registry closed, new registrations are rejected");
        }
    }

    /// Register a service instance
    ///
    /// Re-registering a live id replaces the record but keeps its
    /// registration time and position in the registration order. An expired
    /// id registers as a new instance.
    pub async fn register(&self, registration: ServiceRegistration) -> AppResult<ServiceInfo> {
        self.register_at(registration, Utc::now()).await
    }

    async fn register_at(
        &self,
        registration: ServiceRegistration,
        now: DateTime<Utc>,
    ) -> AppResult<ServiceInfo> {
        if self.is_closed() {
            return Err(AppError::new(ErrorCode::Service, "Registry is closed"));
        }

        if let Err(errors) = registration.validate() {
            warn!("Registry: Rejected registration for id={}", registration.id);
            return Err(errors.into());
        }

        let mut services = self.services.write().await;
        let mut info = ServiceInfo::from_registration(registration, now);

        let live = services
            .get(&info.id)
            .filter(|existing| !existing.info.is_expired(now, self.ttl));
        let seq = match live {
            Some(existing) => {
                info.registered_at = existing.info.registered_at;
                debug!("Registry: Replacing registration for id={}", info.id);
                existing.seq
            }
            None => self.next_seq.fetch_add(1, Ordering::SeqCst),
        };

        info!(
            "Registry: Registered service id={}, name={}, endpoint={}",
            info.id, info.name, info.endpoint
        );
        services.insert(info.id.clone(), Entry { seq, info: info.clone() });

        Ok(info)
    }

    /// Register several instances independently
    ///
    /// # Returns
    /// The stored records and, for each rejected entry, its id and error
    pub async fn register_all(
        &self,
        registrations: Vec<ServiceRegistration>,
    ) -> (Vec<ServiceInfo>, Vec<(String, AppError)>) {
        info!("Registry: Processing bulk registration for {} services", registrations.len());

        let mut registered = Vec::new();
        let mut failed = Vec::new();

        for registration in registrations {
            let id = registration.id.clone();
            match self.register(registration).await {
                Ok(info) => registered.push(info),
                Err(err) => failed.push((id, err)),
            }
        }

        if failed.is_empty() {
            info!("Registry: Bulk registration completed: {} registered", registered.len());
        } else {
            warn!(
                "Registry: Bulk registration completed with {} failures",
                failed.len()
            );
        }

        (registered, failed)
    }

    /// Remove a service instance
    ///
    /// An expired instance is dropped too, but reported as not found.
    pub async fn deregister(&self, id: &str) -> AppResult<ServiceInfo> {
        self.deregister_at(id, Utc::now()).await
    }

    async fn deregister_at(&self, id: &str, now: DateTime<Utc>) -> AppResult<ServiceInfo> {
        let mut services = self.services.write().await;
        match services.remove(id) {
            Some(entry) if entry.info.is_expired(now, self.ttl) => {
                debug!("Registry: Dropped expired service id={} on deregister", id);
                Err(not_found(id))
            }
            Some(entry) => {
                info!("Registry: Deregistered service id={}, name={}", id, entry.info.name);
                Ok(entry.info)
            }
            None => Err(not_found(id)),
        }
    }

    pub async fn get_service(&self, id: &str) -> AppResult<ServiceInfo> {
        self.get_service_at(id, Utc::now()).await
    }

    async fn get_service_at(&self, id: &str, now: DateTime<Utc>) -> AppResult<ServiceInfo> {
        let services = self.services.read().await;
        services
            .get(id)
            .filter(|entry| !entry.info.is_expired(now, self.ttl))
            .map(|entry| entry.info.clone())
            .ok_or_else(|| not_found(id))
    }

    /// Live instances of `name`, in registration order
    pub async fn get_services_by_name(&self, name: &str) -> Vec<ServiceInfo> {
        self.live_services(Utc::now(), |info| info.name == name).await
    }

    /// Every live instance, in registration order
    pub async fn list_services(&self) -> Vec<ServiceInfo> {
        self.live_services(Utc::now(), |_| true).await
    }

    async fn live_services<F>(&self, now: DateTime<Utc>, filter: F) -> Vec<ServiceInfo>
    where
        F: Fn(&ServiceInfo) -> bool,
    {
        let services = self.services.read().await;
        let mut entries: Vec<&Entry> = services
            .values()
            .filter(|entry| !entry.info.is_expired(now, self.ttl) && filter(&entry.info))
            .collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| entry.info.clone()).collect()
    }

    /// Pick one healthy instance of `name` using the configured policy
    pub async fn select_service(&self, name: &str) -> AppResult<ServiceInfo> {
        let instances = self.get_services_by_name(name).await;
        if instances.is_empty() {
            warn!("Registry: No instances registered for name={}", name);
            return Err(AppError::not_found(format!("No instances registered for service {}", name)));
        }

        let healthy: Vec<ServiceInfo> = instances.into_iter().filter(|s| s.is_healthy()).collect();

        match self.config.selection_policy.pick(&healthy, &self.cursor) {
            Some(selected) => {
                debug!("Registry: Selected id={} for name={}", selected.id, name);
                Ok(selected.clone())
            }
            None => {
                warn!("Registry: No healthy instance for name={}", name);
                Err(AppError::new(
                    ErrorCode::Service,
                    format!("No healthy instance available for service {}", name),
                ))
            }
        }
    }

    /// Replace the health of an instance, which also counts as a heartbeat
    pub async fn update_service_health(
        &self,
        id: &str,
        health: HealthStatus,
    ) -> AppResult<ServiceInfo> {
        self.apply_health(id, health, true).await
    }

    /// Record the outcome of an active health check
    ///
    /// Only a healthy result refreshes the heartbeat, so an instance whose
    /// check keeps failing still expires once its TTL elapses.
    pub async fn record_check_result(
        &self,
        id: &str,
        health: HealthStatus,
    ) -> AppResult<ServiceInfo> {
        let refresh = health.status == HealthState::Healthy;
        self.apply_health(id, health, refresh).await
    }

    async fn apply_health(
        &self,
        id: &str,
        health: HealthStatus,
        refresh_heartbeat: bool,
    ) -> AppResult<ServiceInfo> {
        let now = Utc::now();
        let mut services = self.services.write().await;
        let entry = services
            .get_mut(id)
            .filter(|entry| !entry.info.is_expired(now, self.ttl))
            .ok_or_else(|| not_found(id))?;

        if entry.info.health_state() != health.status {
            info!(
                "Registry: Health of id={} changed: {:?} -> {:?}",
                id,
                entry.info.health_state(),
                health.status
            );
        }

        entry.info.health = Some(health);
        if refresh_heartbeat {
            entry.info.last_heartbeat = now;
        }
        Ok(entry.info.clone())
    }

    /// Refresh the TTL of an instance
    pub async fn heartbeat(&self, id: &str) -> AppResult<ServiceInfo> {
        let now = Utc::now();
        let mut services = self.services.write().await;
        let entry = services
            .get_mut(id)
            .filter(|entry| !entry.info.is_expired(now, self.ttl))
            .ok_or_else(|| not_found(id))?;

        entry.info.last_heartbeat = now;
        debug!("Registry: Heartbeat from id={}", id);
        Ok(entry.info.clone())
    }

    pub async fn status(&self) -> RegistryStatus {
        let live = self.list_services().await;

        let mut status = RegistryStatus {
            total_services: live.len(),
            healthy_services: 0,
            unhealthy_services: 0,
            unknown_services: 0,
            services_by_name: BTreeMap::new(),
            ttl_seconds: self.config.ttl.as_secs(),
            selection_policy: self.config.selection_policy,
            closed: self.is_closed(),
        };

        for info in &live {
            match info.health_state() {
                HealthState::Healthy => status.healthy_services += 1,
                HealthState::Unhealthy => status.unhealthy_services += 1,
                HealthState::Unknown => status.unknown_services += 1,
            }
            *status.services_by_name.entry(info.name.clone()).or_insert(0) += 1;
        }

        status
    }

    /// Remove every instance whose TTL elapsed, returning their ids
    pub async fn expire_stale(&self) -> Vec<String> {
        self.expire_stale_at(Utc::now()).await
    }

    async fn expire_stale_at(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut services = self.services.write().await;
        let expired: Vec<String> = services
            .values()
            .filter(|entry| entry.info.is_expired(now, self.ttl))
            .map(|entry| entry.info.id.clone())
            .collect();

        for id in &expired {
            services.remove(id);
        }

        expired
    }

    /// Live instances that declared a health check URL, as (id, url)
    pub async fn probe_targets(&self) -> Vec<(String, String)> {
        self.live_services(Utc::now(), |info| info.health_check_url.is_some())
            .await
            .into_iter()
            .filter_map(|info| info.health_check_url.map(|url| (info.id, url)))
            .collect()
    }
}

fn not_found(id: &str) -> AppError {
    AppError::not_found(format!("Service {} not found", id))
}
