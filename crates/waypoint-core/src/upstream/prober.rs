use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast, time::interval};
use tracing::{debug, info, warn};

use super::{executor::RequestExecutor, registry::Service};
use crate::{metrics::MetricsCollector, types::ServiceRequest};

/// Interval and deadline of the background prober.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProberConfig {
    pub interval: Duration,
    /// Deadline of a single liveness call; shorter than the executor's attempt deadline.
    pub timeout: Duration,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(30), timeout: Duration::from_secs(3) }
    }
}

/// Result of probing one service once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub service: String,
    pub healthy: usize,
    pub failed: usize,
}

/// Periodically issues a cheap liveness call to every registered endpoint.
///
/// Keeps health fresh for endpoints that real traffic does not reach (the
/// second of a pair, quarantined ones). Probe outcomes go through the same
/// recording path as real attempts; probe errors are only logged.
pub struct HealthProber {
    executor: Arc<RequestExecutor>,
    metrics: Arc<MetricsCollector>,
    config: ProberConfig,
}

impl HealthProber {
    #[must_use]
    pub fn new(
        executor: Arc<RequestExecutor>,
        metrics: Arc<MetricsCollector>,
        config: ProberConfig,
    ) -> Self {
        Self { executor, metrics, config }
    }

    #[must_use]
    pub fn config(&self) -> &ProberConfig {
        &self.config
    }

    /// Spawns the probe loop. The first round runs immediately.
    #[must_use]
    pub fn start_with_shutdown(
        self: &Arc<Self>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let prober = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval = interval(prober.config.interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let reports = prober.probe_all().await;
                        debug!(services = reports.len(), "probe round complete");
                    }
                    _ = shutdown_rx.recv() => {
                        info!("health prober shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Probes every endpoint of every service concurrently.
    pub async fn probe_all(&self) -> Vec<ProbeReport> {
        let services = self.executor.registry().services();
        join_all(services.iter().map(|service| self.probe_service(service))).await
    }

    /// Probes every endpoint of one service concurrently.
    pub async fn probe_service(&self, service: &Service) -> ProbeReport {
        let request = ServiceRequest::get(service.liveness_path());

        let results = join_all(service.endpoints().iter().map(|endpoint| {
            self.executor.attempt(service.name(), endpoint, &request, self.config.timeout)
        }))
        .await;

        let mut healthy = 0usize;
        for (endpoint, result) in service.endpoints().iter().zip(&results) {
            match result {
                Ok(_) => healthy += 1,
                Err(e) => {
                    debug!(
                        service = %service.name(),
                        endpoint = %endpoint.url(),
                        error = %e,
                        "probe failed"
                    );
                }
            }
        }
        let failed = results.len() - healthy;

        let snapshot = service.snapshot(tokio::time::Instant::now());
        self.metrics.record_probe_round(
            service.name(),
            snapshot.available_endpoints,
            snapshot.quarantined_endpoints,
        );

        if healthy == 0 {
            warn!(service = %service.name(), endpoints = failed, "no endpoint answered liveness probe");
        } else {
            debug!(service = %service.name(), healthy, failed, "service probed");
        }

        ProbeReport { service: service.name().to_string(), healthy, failed }
    }
}
