//! Runtime lifecycle: the prober task, cached access paths and graceful shutdown.

use bytes::Bytes;
use std::sync::Arc;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, error, info};

use super::{builder::WaypointRuntimeBuilder, WaypointComponents};
use crate::{
    cache::{CachedBody, Lookup, ResponseCache, Revalidator},
    config::AppConfig,
    metrics::MetricsCollector,
    types::ServiceRequest,
    upstream::{
        is_usable_json, DualSourceResolver, HealthProber, HealthSnapshot, Registry,
        RequestExecutor, UpstreamError,
    },
};

/// Owns all components and the background prober task.
///
/// Shutdown is coordinated through a broadcast channel: `shutdown()` signals
/// every subscriber and waits for the prober loop to exit.
pub struct WaypointRuntime {
    components: WaypointComponents,
    shutdown_tx: broadcast::Sender<()>,
    config: AppConfig,
    prober_task: Option<JoinHandle<()>>,
}

impl WaypointRuntime {
    #[must_use]
    pub fn builder() -> WaypointRuntimeBuilder {
        WaypointRuntimeBuilder::new()
    }

    pub(super) fn new(
        components: WaypointComponents,
        shutdown_tx: broadcast::Sender<()>,
        config: AppConfig,
        enable_prober: bool,
    ) -> Self {
        let prober_task = if enable_prober {
            let handle = components.prober().start_with_shutdown(shutdown_tx.subscribe());
            debug!(interval_secs = config.prober.interval_seconds, "health prober task started");
            Some(handle)
        } else {
            None
        };

        Self { components, shutdown_tx, config, prober_task }
    }

    #[must_use]
    pub fn components(&self) -> &WaypointComponents {
        &self.components
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        self.components.registry()
    }

    #[must_use]
    pub fn executor(&self) -> &Arc<RequestExecutor> {
        self.components.executor()
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<DualSourceResolver> {
        self.components.resolver()
    }

    #[must_use]
    pub fn prober(&self) -> &Arc<HealthProber> {
        self.components.prober()
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache<CachedBody>> {
        self.components.cache()
    }

    #[must_use]
    pub fn revalidator(&self) -> &Arc<Revalidator<CachedBody>> {
        self.components.revalidator()
    }

    #[must_use]
    pub fn metrics_collector(&self) -> &Arc<MetricsCollector> {
        self.components.metrics_collector()
    }

    #[must_use]
    pub fn has_prober_task(&self) -> bool {
        self.prober_task.is_some()
    }

    /// Per-endpoint diagnostic view of every configured service.
    #[must_use]
    pub fn health_snapshot(&self) -> HealthSnapshot {
        self.registry().health_snapshot()
    }

    /// Executes `request` against `service` through the stale-while-revalidate cache.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::UnknownService`] if `service` is not configured
    /// - The executor's error when nothing is cached for this request
    pub async fn fetch_cached(
        &self,
        service: &str,
        request: &ServiceRequest,
    ) -> Result<Lookup<CachedBody>, UpstreamError> {
        self.registry().service(service)?;
        let key = request.cache_key(service);

        let executor = Arc::clone(self.executor());
        let service = service.to_string();
        let request = request.clone();
        self.revalidator()
            .get_or_fetch(&key, None, move || async move {
                let response = executor.execute(&service, &request).await?;
                Ok(CachedBody { body: response.body, origin: response.endpoint.to_string() })
            })
            .await
    }

    /// Resolves `path` against a configured dual-source pair through the cache.
    ///
    /// Both services receive the same GET request; a JSON body is usable when
    /// [`is_usable_json`] accepts it. The cached origin is the winning
    /// [`SourceKind`](crate::upstream::SourceKind).
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::UnknownDualSource`] if `pair` is not configured
    /// - [`UpstreamError::NoUsableSource`] when neither source is usable and nothing is cached
    pub async fn resolve_pair(
        &self,
        pair: &str,
        path: &str,
    ) -> Result<Lookup<CachedBody>, UpstreamError> {
        let dual = self
            .config
            .dual_source(pair)
            .ok_or_else(|| UpstreamError::UnknownDualSource(pair.to_string()))?;

        let request = ServiceRequest::get(path);
        let key = format!("pair:{pair}:GET:{path}");

        let resolver = Arc::clone(self.resolver());
        let primary = dual.primary.clone();
        let fallback = dual.fallback.clone();
        self.revalidator()
            .get_or_fetch(&key, None, move || async move {
                let resolved = resolver
                    .resolve::<serde_json::Value, _>(&primary, &fallback, &request, is_usable_json)
                    .await?;
                let body = serde_json::to_vec(&resolved.value)
                    .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
                Ok(CachedBody { body: Bytes::from(body), origin: resolved.source.to_string() })
            })
            .await
    }

    /// Creates a new shutdown receiver for external shutdown coordination.
    #[must_use]
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Broadcasts the shutdown signal without waiting for tasks to finish.
    ///
    /// For callers that only hold a shared reference to the runtime.
    pub fn signal_shutdown(&self) {
        if self.shutdown_tx.send(()).is_err() {
            debug!("no shutdown receivers");
        }
    }

    /// Signals all background tasks and waits for the prober loop to exit.
    ///
    /// Consumes the runtime, so it runs at most once per instance.
    pub async fn shutdown(self) {
        info!("initiating waypoint runtime shutdown");
        if let Err(e) = self.shutdown_tx.send(()) {
            debug!(error = %e, "no shutdown receivers");
        }
        if let Some(prober_task) = self.prober_task {
            match prober_task.await {
                Ok(()) => debug!("health prober task completed"),
                Err(e) if e.is_cancelled() => debug!("health prober task cancelled"),
                Err(e) => error!(error = %e, "health prober task failed"),
            }
        }

        info!("waypoint runtime shutdown complete");
    }

    /// Waits for a shutdown signal on the runtime's channel, then cleans up.
    pub async fn wait_for_shutdown(self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let _ = shutdown_rx.recv().await;
        info!("shutdown signal received, runtime terminating");
        self.shutdown().await;
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    let _ = assert_send::<WaypointRuntime>;
    let _ = assert_sync::<WaypointRuntime>;
};
