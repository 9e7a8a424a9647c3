use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Health state reported for a service instance
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Unhealthy,
    #[default]
    Unknown,
}

/// Result of the latest health check of an instance
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HealthStatus {
    pub status: HealthState,
    #[serde(default)]
    pub message: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl HealthStatus {
    pub fn new(status: HealthState, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            timestamp: Utc::now(),
            details: BTreeMap::new(),
        }
    }

    pub fn healthy(message: impl Into<String>) -> Self {
        Self::new(HealthState::Healthy, message)
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::new(HealthState::Unhealthy, message)
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Registration request for a service instance
#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ServiceRegistration {
    #[validate(length(min = 1, max = 128, message = "Service id must be between 1 and 128 characters"))]
    pub id: String,

    #[validate(length(min = 1, max = 128, message = "Service name must be between 1 and 128 characters"))]
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[validate(length(min = 1, max = 255, message = "Endpoint must be between 1 and 255 characters"))]
    pub endpoint: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    #[serde(default)]
    pub health: Option<HealthStatus>,

    /// URL probed by the background health checker, if any
    #[serde(default)]
    #[validate(url(message = "Health check url must be a valid URL"))]
    pub health_check_url: Option<String>,
}

impl ServiceRegistration {
    pub fn new(id: impl Into<String>, name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: String::new(),
            endpoint: endpoint.into(),
            tags: Vec::new(),
            metadata: BTreeMap::new(),
            health: None,
            health_check_url: None,
        }
    }

    pub fn with_health(mut self, health: HealthStatus) -> Self {
        self.health = Some(health);
        self
    }
}

/// A registered service instance
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub endpoint: String,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub health: Option<HealthStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_url: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

impl ServiceInfo {
    pub(crate) fn from_registration(registration: ServiceRegistration, now: DateTime<Utc>) -> Self {
        Self {
            id: registration.id,
            name: registration.name,
            version: registration.version,
            endpoint: registration.endpoint,
            tags: registration.tags,
            metadata: registration.metadata,
            health: registration.health,
            health_check_url: registration.health_check_url,
            registered_at: now,
            last_heartbeat: now,
        }
    }

    pub fn health_state(&self) -> HealthState {
        self.health
            .as_ref()
            .map(|h| h.status)
            .unwrap_or(HealthState::Unknown)
    }

    pub fn is_healthy(&self) -> bool {
        self.health_state() == HealthState::Healthy
    }

    /// An instance expires once no heartbeat arrived within `ttl`
    /// A deadline past the representable range never expires.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.last_heartbeat.checked_add_signed(ttl) {
            Some(deadline) => deadline < now,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_health_is_unknown() {
        let info = ServiceInfo::from_registration(
            ServiceRegistration::new("svc-1", "api", "localhost:8080"),
            Utc::now(),
        );

        assert_eq!(info.health_state(), HealthState::Unknown);
        assert!(!info.is_healthy());
    }

    #[test]
    fn expiry_is_strictly_after_ttl() {
        let now = Utc::now();
        let info = ServiceInfo::from_registration(
            ServiceRegistration::new("svc-1", "api", "localhost:8080"),
            now,
        );
        let ttl = Duration::seconds(60);

        assert!(!info.is_expired(now + Duration::seconds(60), ttl));
        assert!(info.is_expired(now + Duration::seconds(61), ttl));
    }

    #[test]
    fn huge_ttl_never_expires() {
        let now = Utc::now();
        let info = ServiceInfo::from_registration(
            ServiceRegistration::new("svc-1", "api", "localhost:8080"),
            now,
        );

        assert!(!info.is_expired(now + Duration::days(1), Duration::MAX));
    }

    #[test]
    fn registration_requires_id_name_and_endpoint() {
        assert!(ServiceRegistration::new("svc", "api", "localhost:8080").validate().is_ok());

        let errors = ServiceRegistration::new("", "", "").validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("id"));
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("endpoint"));
    }

    #[test]
    fn health_check_url_must_parse() {
        let mut registration = ServiceRegistration::new("svc", "api", "localhost:8080");
        registration.health_check_url = Some("not a url".to_string());
        assert!(registration.validate().is_err());

        registration.health_check_url = Some("http://localhost:8080/health".to_string());
        assert!(registration.validate().is_ok());
    }

    #[test]
    fn deserializes_minimal_payload() {
        let registration: ServiceRegistration = serde_json::from_value(serde_json::json!({
            "id": "svc-1",
            "name": "api",
            "endpoint": "localhost:8080",
            "health": {"status": "healthy"}
        }))
        .unwrap();

        assert!(registration.tags.is_empty());
        assert_eq!(
            registration.health.map(|h| h.status),
            Some(HealthState::Healthy)
        );
    }
}
