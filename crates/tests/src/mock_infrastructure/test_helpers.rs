//! Configuration and runtime fixtures.

use serde_json::{json, Value};
use std::sync::Arc;
use waypoint_core::{
    config::{AppConfig, DualSourceConfig, ServiceConfig},
    runtime::WaypointRuntime,
    upstream::EndpointSnapshot,
};

/// Base URL that refuses connections immediately.
pub const UNREACHABLE: &str = "http://127.0.0.1:1";

#[must_use]
pub fn service(name: &str, endpoints: &[String]) -> ServiceConfig {
    ServiceConfig { name: name.to_string(), endpoints: endpoints.to_vec(), liveness_path: None }
}

#[must_use]
pub fn service_with_liveness(name: &str, endpoints: &[String], liveness: &str) -> ServiceConfig {
    ServiceConfig { liveness_path: Some(liveness.to_string()), ..service(name, endpoints) }
}

#[must_use]
pub fn pair(name: &str, primary: &str, fallback: &str) -> DualSourceConfig {
    DualSourceConfig {
        name: name.to_string(),
        primary: primary.to_string(),
        fallback: fallback.to_string(),
    }
}

/// Configuration with timings short enough for tests against local servers.
#[must_use]
pub fn test_config(services: Vec<ServiceConfig>, dual_sources: Vec<DualSourceConfig>) -> AppConfig {
    let mut config = AppConfig { services, dual_sources, ..AppConfig::default() };
    config.executor.attempt_timeout_ms = 2_000;
    config.executor.retry_delay_ms = 10;
    config.executor.connect_timeout_ms = 500;
    config.prober.interval_seconds = 1;
    config.prober.timeout_ms = 500;
    config.cache.fresh_window_seconds = 1;
    config
}

/// Builds a runtime without the prober loop.
///
/// # Panics
///
/// Panics if `config` does not validate.
#[must_use]
pub fn build_runtime(config: AppConfig) -> Arc<WaypointRuntime> {
    Arc::new(WaypointRuntime::builder().with_config(config).build().expect("valid test config"))
}

/// Health snapshot of one endpoint of `service`, by position in configuration order.
///
/// # Panics
///
/// Panics if the service or index does not exist.
#[must_use]
pub fn endpoint_health(runtime: &WaypointRuntime, service: &str, index: usize) -> EndpointSnapshot {
    let snapshot = runtime.health_snapshot();
    snapshot.service(service).expect("service in snapshot").endpoints[index].clone()
}

/// `{"blocks": [...]}` with the given heights.
#[must_use]
pub fn blocks_payload(heights: &[u64]) -> Value {
    let blocks: Vec<Value> = heights.iter().map(|h| json!({ "height": h })).collect();
    json!({ "blocks": blocks })
}
