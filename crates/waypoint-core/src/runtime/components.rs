//! Core component container for the Waypoint runtime.

use std::sync::Arc;

use crate::{
    cache::{CachedBody, ResponseCache, Revalidator},
    metrics::MetricsCollector,
    upstream::{DualSourceResolver, HealthProber, Registry, RequestExecutor},
};

/// Container for all initialized components, each shared by `Arc`.
#[derive(Clone)]
pub struct WaypointComponents {
    metrics_collector: Arc<MetricsCollector>,
    registry: Arc<Registry>,
    executor: Arc<RequestExecutor>,
    resolver: Arc<DualSourceResolver>,
    prober: Arc<HealthProber>,
    cache: Arc<ResponseCache<CachedBody>>,
    revalidator: Arc<Revalidator<CachedBody>>,
}

impl WaypointComponents {
    /// Called by `WaypointRuntimeBuilder` during initialization.
    #[must_use]
    pub fn new(
        metrics_collector: Arc<MetricsCollector>,
        registry: Arc<Registry>,
        executor: Arc<RequestExecutor>,
        resolver: Arc<DualSourceResolver>,
        prober: Arc<HealthProber>,
        cache: Arc<ResponseCache<CachedBody>>,
        revalidator: Arc<Revalidator<CachedBody>>,
    ) -> Self {
        Self { metrics_collector, registry, executor, resolver, prober, cache, revalidator }
    }

    #[must_use]
    pub fn metrics_collector(&self) -> &Arc<MetricsCollector> {
        &self.metrics_collector
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<DualSourceResolver> {
        &self.resolver
    }

    #[must_use]
    pub fn prober(&self) -> &Arc<HealthProber> {
        &self.prober
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache<CachedBody>> {
        &self.cache
    }

    #[must_use]
    pub fn revalidator(&self) -> &Arc<Revalidator<CachedBody>> {
        &self.revalidator
    }
}
