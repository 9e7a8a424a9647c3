use std::env;
use std::time::Duration;

use crate::cli::Cli;
use crate::errors::AppError;
use crate::registry::{RegistryConfig, SelectionPolicy};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Address the HTTP server binds to
    pub host: String,
    pub port: u16,

    /// Maximum payload size for all requests (in bytes)
    /// Default: 1MB
    pub max_payload_size: usize,

    /// Interval between expiry sweeps and health probes
    pub check_interval: Duration,

    /// Timeout of a single health probe request
    pub probe_timeout: Duration,

    /// How long an instance survives without a heartbeat
    pub service_ttl: Duration,

    pub selection_policy: SelectionPolicy,

    /// Whether registered health check URLs are actively probed
    pub health_probe_enabled: bool,

    pub max_concurrent_probes: usize,

    /// Directory for the rolling log files
    pub log_dir: String,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Optional environment variables:
    /// - REGISTRY_HOST: bind address (default: 127.0.0.1)
    /// - REGISTRY_PORT: bind port (default: 8080)
    /// - MAX_PAYLOAD_SIZE: maximum request payload size in bytes (default: 1048576)
    /// - CHECK_INTERVAL_SECS: sweep/probe interval (default: 30)
    /// - PROBE_TIMEOUT_SECS: health probe timeout (default: 5)
    /// - SERVICE_TTL_SECS: heartbeat TTL (default: 60)
    /// - SELECTION_POLICY: first | random | round_robin (default: first)
    /// - HEALTH_PROBE_ENABLED: true | false (default: false)
    /// - MAX_CONCURRENT_PROBES: probe concurrency (default: 8)
    /// - LOG_DIR: log directory (default: logs)
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("REGISTRY_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&lookup, "REGISTRY_PORT", 8080)?;
        let max_payload_size = parse_or(&lookup, "MAX_PAYLOAD_SIZE", 1024 * 1024)?;
        let check_interval = Duration::from_secs(parse_or(&lookup, "CHECK_INTERVAL_SECS", 30)?);
        let probe_timeout = Duration::from_secs(parse_or(&lookup, "PROBE_TIMEOUT_SECS", 5)?);
        let service_ttl = Duration::from_secs(parse_or(&lookup, "SERVICE_TTL_SECS", 60)?);
        let health_probe_enabled = parse_or(&lookup, "HEALTH_PROBE_ENABLED", false)?;
        let max_concurrent_probes = parse_or(&lookup, "MAX_CONCURRENT_PROBES", 8)?;
        let log_dir = lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string());

        let selection_policy = match lookup("SELECTION_POLICY") {
            Some(value) => value.parse()?,
            None => SelectionPolicy::default(),
        };

        let config = Config {
            host,
            port,
            max_payload_size,
            check_interval,
            probe_timeout,
            service_ttl,
            selection_policy,
            health_probe_enabled,
            max_concurrent_probes,
            log_dir,
        };
        config.validate()?;
        Ok(config)
    }

    /// Command line flags take precedence over the environment
    pub fn apply_cli(mut self, cli: Cli) -> Result<Self, AppError> {
        if let Some(host) = cli.host {
            self.host = host;
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(ttl) = cli.ttl {
            self.service_ttl = Duration::from_secs(ttl);
        }
        if let Some(policy) = cli.policy {
            self.selection_policy = policy;
        }
        if let Some(log_dir) = cli.log_dir {
            self.log_dir = log_dir;
        }
        if cli.probe {
            self.health_probe_enabled = true;
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.service_ttl.is_zero() {
            return Err(AppError::config("SERVICE_TTL_SECS must be greater than zero"));
        }
        if self.check_interval.is_zero() {
            return Err(AppError::config("CHECK_INTERVAL_SECS must be greater than zero"));
        }
        if self.probe_timeout.is_zero() {
            return Err(AppError::config("PROBE_TIMEOUT_SECS must be greater than zero"));
        }
        Ok(())
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            ttl: self.service_ttl,
            selection_policy: self.selection_policy,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::config(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}
