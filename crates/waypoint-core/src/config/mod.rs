//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: `Default` implementations and `set_default` keys
//! 2. **Config file**: TOML file specified by `WAYPOINT_CONFIG` env var
//! 3. **Environment variables**: `WAYPOINT__*` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - [`ServerConfig`]: HTTP gateway bind address and concurrency
//! - [`ExecutorSettings`]: per-attempt deadline, retry pause, outbound concurrency
//! - [`HealthSettings`]: quarantine threshold, cooldown, latency smoothing
//! - [`ProberSettings`]: background liveness probing
//! - [`CacheSettings`]: freshness window and capacity
//! - [`ServiceConfig`]: logical services and their endpoint URLs
//! - [`DualSourceConfig`]: named primary/fallback service pairs
//! - [`LoggingConfig`]: log level and format
//!
//! # Example
//!
//! ```toml
//! [health]
//! max_failures = 3
//! cooldown_seconds = 30
//!
//! [[services]]
//! name = "indexer"
//! endpoints = ["https://indexer-a.example.com", "https://indexer-b.example.com"]
//! liveness_path = "/status"
//!
//! [[services]]
//! name = "node"
//! endpoints = ["https://node-a.example.com"]
//!
//! [[dual_sources]]
//! name = "blocks"
//! primary = "indexer"
//! fallback = "node"
//! ```

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path, time::Duration};
use url::Url;

use crate::{
    cache::CacheConfig,
    upstream::{ExecutorConfig, HealthPolicy, HttpClientConfig, ProberConfig},
};

/// HTTP gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IP address to bind the gateway to. Defaults to `127.0.0.1`.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port number to listen on. Defaults to `3030`.
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// Maximum number of concurrent inbound requests. Defaults to `100`.
    #[serde(default = "default_server_concurrency")]
    pub max_concurrent_requests: usize,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    3030
}

fn default_server_concurrency() -> usize {
    100
}

/// Executor timing and outbound HTTP limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSettings {
    /// Deadline of a single attempt in milliseconds. Defaults to `8000`.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    /// Pause between a failed attempt and the next candidate. Defaults to `250`.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Maximum number of concurrent outbound requests. Defaults to `256`.
    #[serde(default = "default_outbound_concurrency")]
    pub max_concurrent_requests: usize,

    /// TCP connect timeout in milliseconds. Defaults to `3000`.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_attempt_timeout_ms() -> u64 {
    8_000
}

fn default_retry_delay_ms() -> u64 {
    250
}

fn default_outbound_concurrency() -> usize {
    256
}

fn default_connect_timeout_ms() -> u64 {
    3_000
}

/// Quarantine and ranking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSettings {
    /// Consecutive failures before an endpoint is quarantined. Defaults to `3`.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Seconds after the last failure before a quarantined endpoint is retried. Defaults to `30`.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,

    /// Weight of the newest latency sample, in `(0, 1]`. Defaults to `0.3`.
    #[serde(default = "default_latency_weight")]
    pub latency_weight: f64,

    /// Number of best-ranked endpoints that share traffic. Defaults to `2`.
    #[serde(default = "default_rotation_width")]
    pub rotation_width: usize,
}

fn default_max_failures() -> u32 {
    3
}

fn default_cooldown_seconds() -> u64 {
    30
}

fn default_latency_weight() -> f64 {
    0.3
}

fn default_rotation_width() -> usize {
    2
}

/// Background prober settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProberSettings {
    /// Whether the gateway runs the prober. Defaults to `true`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between probe rounds. Defaults to `30`.
    #[serde(default = "default_probe_interval_seconds")]
    pub interval_seconds: u64,

    /// Deadline of a single probe in milliseconds. Defaults to `3000`.
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_probe_interval_seconds() -> u64 {
    30
}

fn default_probe_timeout_ms() -> u64 {
    3_000
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Seconds an entry counts as fresh. Defaults to `10`.
    #[serde(default = "default_fresh_window_seconds")]
    pub fresh_window_seconds: u64,

    /// Maximum number of cached keys. Defaults to `1024`.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_fresh_window_seconds() -> u64 {
    10
}

fn default_max_entries() -> usize {
    1024
}

/// A logical service and its interchangeable endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,

    /// Base URLs, in configured order.
    pub endpoints: Vec<String>,

    /// Path probed for liveness. Defaults to `/`.
    #[serde(default)]
    pub liveness_path: Option<String>,
}

/// Two services queried in parallel for the same logical data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DualSourceConfig {
    pub name: String,
    pub primary: String,
    pub fallback: String,
}

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "trace", "debug", "info", "warn", "error"). Defaults to `"info"`.
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    pub format: String,
}

/// Root application configuration.
///
/// Loaded with the `WAYPOINT` prefix for environment overrides using `__` as a
/// separator, e.g. `WAYPOINT__HEALTH__COOLDOWN_SECONDS=60`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment (e.g., "development", "production"). Defaults to `"development"`.
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub executor: ExecutorSettings,

    #[serde(default)]
    pub health: HealthSettings,

    #[serde(default)]
    pub prober: ProberSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub services: Vec<ServiceConfig>,

    #[serde(default)]
    pub dual_sources: Vec<DualSourceConfig>,
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            max_concurrent_requests: default_server_concurrency(),
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: default_attempt_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            max_concurrent_requests: default_outbound_concurrency(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            cooldown_seconds: default_cooldown_seconds(),
            latency_weight: default_latency_weight(),
            rotation_width: default_rotation_width(),
        }
    }
}

impl Default for ProberSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_probe_interval_seconds(),
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            fresh_window_seconds: default_fresh_window_seconds(),
            max_entries: default_max_entries(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            server: ServerConfig::default(),
            executor: ExecutorSettings::default(),
            health: HealthSettings::default(),
            prober: ProberSettings::default(),
            cache: CacheSettings::default(),
            logging: LoggingConfig::default(),
            services: Vec::new(),
            dual_sources: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be parsed or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("environment", "development")?
            .set_default("server.bind_address", "127.0.0.1")?
            .set_default("server.bind_port", 3030)?
            .set_default("server.max_concurrent_requests", 100)?
            .set_default("executor.attempt_timeout_ms", 8_000)?
            .set_default("executor.retry_delay_ms", 250)?
            .set_default("executor.max_concurrent_requests", 256)?
            .set_default("executor.connect_timeout_ms", 3_000)?
            .set_default("health.max_failures", 3)?
            .set_default("health.cooldown_seconds", 30)?
            .set_default("health.latency_weight", 0.3)?
            .set_default("health.rotation_width", 2)?
            .set_default("prober.enabled", true)?
            .set_default("prober.interval_seconds", 30)?
            .set_default("prober.timeout_ms", 3_000)?
            .set_default("cache.fresh_window_seconds", 10)?
            .set_default("cache.max_entries", 1024)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("WAYPOINT").separator("__"))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/config.toml`, or the path in `WAYPOINT_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_file(Self::config_path())
    }

    /// Path `load` reads from.
    #[must_use]
    pub fn config_path() -> String {
        std::env::var("WAYPOINT_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string())
    }

    /// Returns the parsed socket address for the HTTP gateway.
    ///
    /// # Errors
    ///
    /// Returns an error string if the address cannot be parsed into a valid [`SocketAddr`].
    ///
    /// [`SocketAddr`]: std::net::SocketAddr
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, String> {
        format!("{}:{}", self.server.bind_address, self.server.bind_port)
            .parse()
            .map_err(|_| {
                format!(
                    "Invalid socket address: {}:{}",
                    self.server.bind_address, self.server.bind_port
                )
            })
    }

    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }

    #[must_use]
    pub fn dual_source(&self, name: &str) -> Option<&DualSourceConfig> {
        self.dual_sources.iter().find(|d| d.name == name)
    }

    #[must_use]
    pub fn health_policy(&self) -> HealthPolicy {
        HealthPolicy {
            max_failures: self.health.max_failures,
            cooldown: Duration::from_secs(self.health.cooldown_seconds),
            latency_weight: self.health.latency_weight,
            rotation_width: self.health.rotation_width,
        }
    }

    #[must_use]
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            attempt_timeout: Duration::from_millis(self.executor.attempt_timeout_ms),
            retry_delay: Duration::from_millis(self.executor.retry_delay_ms),
        }
    }

    #[must_use]
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            concurrent_limit: self.executor.max_concurrent_requests,
            connect_timeout_ms: self.executor.connect_timeout_ms,
            ..HttpClientConfig::default()
        }
    }

    #[must_use]
    pub fn prober_config(&self) -> ProberConfig {
        ProberConfig {
            interval: Duration::from_secs(self.prober.interval_seconds),
            timeout: Duration::from_millis(self.prober.timeout_ms),
        }
    }

    #[must_use]
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            fresh_window: Duration::from_secs(self.cache.fresh_window_seconds),
            max_entries: self.cache.max_entries,
        }
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// Checks include:
    /// - At least one service, each with at least one `http(s)` endpoint URL
    /// - Service names are unique
    /// - Dual-source pairs name two different, configured services
    /// - Timeouts, intervals and `max_failures` are greater than zero
    /// - Latency weight is in `(0, 1]`
    /// - Logging format is either `"json"` or `"pretty"`
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.services.is_empty() {
            return Err("No services configured".to_string());
        }

        let mut names = HashSet::new();
        for service in &self.services {
            if service.name.is_empty() {
                return Err("Service name must not be empty".to_string());
            }
            if !names.insert(service.name.as_str()) {
                return Err(format!("Duplicate service name: {}", service.name));
            }
            if service.endpoints.is_empty() {
                return Err(format!("No endpoints configured for service: {}", service.name));
            }
            for endpoint in &service.endpoints {
                validate_endpoint_url(&service.name, endpoint)?;
            }
            if let Some(path) = &service.liveness_path {
                if !path.starts_with('/') {
                    return Err(format!(
                        "Liveness path for service {} must start with '/': {}",
                        service.name, path
                    ));
                }
            }
        }

        let mut pairs = HashSet::new();
        for pair in &self.dual_sources {
            if !pairs.insert(pair.name.as_str()) {
                return Err(format!("Duplicate dual-source name: {}", pair.name));
            }
            for side in [&pair.primary, &pair.fallback] {
                if !names.contains(side.as_str()) {
                    return Err(format!(
                        "Dual-source {} references unknown service: {}",
                        pair.name, side
                    ));
                }
            }
            if pair.primary == pair.fallback {
                return Err(format!(
                    "Dual-source {} must use two different services",
                    pair.name
                ));
            }
        }

        if self.executor.attempt_timeout_ms == 0 {
            return Err("Attempt timeout must be greater than 0".to_string());
        }

        if self.executor.max_concurrent_requests == 0 {
            return Err("Max concurrent outbound requests must be greater than 0".to_string());
        }

        if self.health.max_failures == 0 {
            return Err("Max failures must be greater than 0".to_string());
        }

        if self.health.cooldown_seconds == 0 {
            return Err("Cooldown must be greater than 0".to_string());
        }

        if !(self.health.latency_weight > 0.0 && self.health.latency_weight <= 1.0) {
            return Err("Latency weight must be in (0, 1]".to_string());
        }

        if self.health.rotation_width == 0 {
            return Err("Rotation width must be greater than 0".to_string());
        }

        if self.prober.interval_seconds == 0 {
            return Err("Probe interval must be greater than 0".to_string());
        }

        if self.prober.timeout_ms == 0 {
            return Err("Probe timeout must be greater than 0".to_string());
        }

        if self.cache.fresh_window_seconds == 0 {
            return Err("Cache fresh window must be greater than 0".to_string());
        }

        if self.server.max_concurrent_requests == 0 {
            return Err("Max concurrent requests must be greater than 0".to_string());
        }

        if self.server.bind_port == 0 {
            return Err("Bind port must be greater than 0".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }
}

fn validate_endpoint_url(service: &str, endpoint: &str) -> Result<(), String> {
    let url = Url::parse(endpoint)
        .map_err(|e| format!("Invalid endpoint URL for service {service}: {endpoint} ({e})"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!(
            "Endpoint URL for service {service} must use http or https: {endpoint}"
        ));
    }
    Ok(())
}
