//! Prometheus metrics for endpoint attempts, resolution and caching.
//!
//! Recording goes through the `metrics` facade and is lock-free. The Prometheus
//! recorder is installed once per process; every [`MetricsCollector`] shares the
//! same handle, so creating several collectors (tests, embedded runtimes) is fine.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use crate::upstream::{errors::SourceKind, health::AttemptOutcome};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn try_init_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

fn init_prometheus_recorder() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| match try_init_prometheus_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "using detached Prometheus recorder, metrics may not be globally visible"
                );
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

/// Cache lookup classification used for metrics and response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Fresh,
    Stale,
    Miss,
}

impl CacheStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Miss => "miss",
        }
    }
}

pub struct MetricsCollector {
    prometheus_handle: PrometheusHandle,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self { prometheus_handle: init_prometheus_recorder() }
    }

    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn record_attempt(
        &self,
        service: &str,
        endpoint: &str,
        outcome: AttemptOutcome,
        latency: Duration,
    ) {
        counter!(
            "waypoint_attempts_total",
            "service" => service.to_string(),
            "endpoint" => endpoint.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
        if outcome == AttemptOutcome::Success {
            histogram!(
                "waypoint_attempt_duration_seconds",
                "service" => service.to_string(),
                "endpoint" => endpoint.to_string()
            )
            .record(latency.as_secs_f64());
        }
    }

    pub fn record_quarantine(&self, service: &str, endpoint: &str) {
        counter!(
            "waypoint_quarantines_total",
            "service" => service.to_string(),
            "endpoint" => endpoint.to_string()
        )
        .increment(1);
    }

    pub fn record_exhausted(&self, service: &str) {
        counter!("waypoint_all_endpoints_failed_total", "service" => service.to_string())
            .increment(1);
    }

    pub fn record_probe_round(&self, service: &str, available: usize, quarantined: usize) {
        #[allow(clippy::cast_precision_loss)]
        {
            gauge!("waypoint_available_endpoints", "service" => service.to_string())
                .set(available as f64);
            gauge!("waypoint_quarantined_endpoints", "service" => service.to_string())
                .set(quarantined as f64);
        }
    }

    /// Records which source won a dual-source resolution, or `None` when neither was usable.
    pub fn record_resolution(&self, pair: &str, winner: Option<SourceKind>) {
        let winner = winner.map_or("none", |w| w.as_str());
        counter!("waypoint_resolutions_total", "pair" => pair.to_string(), "winner" => winner)
            .increment(1);
    }

    pub fn record_cache_lookup(&self, status: CacheStatus) {
        counter!("waypoint_cache_lookups_total", "status" => status.as_str()).increment(1);
    }

    pub fn record_cache_refresh(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        counter!("waypoint_cache_refreshes_total", "result" => result).increment(1);
    }

    pub fn record_cache_entries(&self, entries: usize) {
        #[allow(clippy::cast_precision_loss)]
        gauge!("waypoint_cache_entries").set(entries as f64);
    }

    /// Renders all metrics in the Prometheus text exposition format.
    #[must_use]
    pub fn get_prometheus_metrics(&self) -> String {
        self.prometheus_handle.render()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
