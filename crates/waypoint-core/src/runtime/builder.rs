//! Builder for initializing the Waypoint runtime from configuration.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{lifecycle::WaypointRuntime, WaypointComponents};
use crate::{
    cache::{ResponseCache, Revalidator},
    config::AppConfig,
    metrics::MetricsCollector,
    upstream::{
        DualSourceResolver, HealthProber, HttpClient, Registry, RequestExecutor, Transport,
    },
};

/// Errors that can occur during runtime initialization.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Generic initialization error
    #[error("Runtime initialization failed: {0}")]
    Initialization(String),
}

#[derive(Clone)]
struct RuntimeOptions {
    enable_prober: bool,
    shutdown_channel_capacity: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self { enable_prober: false, shutdown_channel_capacity: 16 }
    }
}

/// Builder for constructing a [`WaypointRuntime`].
///
/// # Examples
///
/// ```no_run
/// # use waypoint_core::{config::AppConfig, runtime::WaypointRuntimeBuilder};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AppConfig::load()?;
///
/// let runtime = WaypointRuntimeBuilder::new()
///     .with_config(config)
///     .enable_prober()
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct WaypointRuntimeBuilder {
    config: Option<AppConfig>,
    transport: Option<Arc<dyn Transport>>,
    metrics: Option<Arc<MetricsCollector>>,
    options: RuntimeOptions,
}

impl WaypointRuntimeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self { config: None, transport: None, metrics: None, options: RuntimeOptions::default() }
    }

    #[must_use]
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the reqwest transport, e.g. with an in-memory one in tests.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Starts the background prober loop when the runtime is built.
    ///
    /// The prober component exists either way; without this flag it only runs
    /// when [`HealthProber::probe_all`] is called explicitly.
    #[must_use]
    pub fn enable_prober(mut self) -> Self {
        self.options.enable_prober = true;
        self
    }

    #[must_use]
    pub fn disable_prober(mut self) -> Self {
        self.options.enable_prober = false;
        self
    }

    /// Sets custom shutdown channel capacity (default: 16).
    #[must_use]
    pub fn with_shutdown_channel_capacity(mut self, capacity: usize) -> Self {
        self.options.shutdown_channel_capacity = capacity;
        self
    }

    /// Builds the runtime and starts background tasks.
    ///
    /// Must be called from within a tokio runtime when the prober is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] if configuration is missing or invalid, or the
    /// HTTP client cannot be built.
    pub fn build(self) -> Result<WaypointRuntime, RuntimeError> {
        let config = self.config.ok_or_else(|| {
            RuntimeError::ConfigValidation("No configuration provided".to_string())
        })?;

        config.validate().map_err(RuntimeError::ConfigValidation)?;

        info!(
            services = config.services.len(),
            dual_sources = config.dual_sources.len(),
            prober_enabled = self.options.enable_prober,
            "initializing waypoint runtime"
        );

        let (shutdown_tx, _) =
            broadcast::channel::<()>(self.options.shutdown_channel_capacity.max(1));

        let metrics = self.metrics.unwrap_or_else(MetricsCollector::shared);

        let registry = Arc::new(Registry::new(config.health_policy()));
        for service in &config.services {
            registry
                .register(&service.name, &service.endpoints, service.liveness_path.clone())
                .map_err(|e| RuntimeError::Initialization(format!("Service registry: {e}")))?;
        }
        debug!(services = registry.len(), "registry initialized");

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                HttpClient::with_config(config.http_client_config())
                    .map_err(|e| RuntimeError::Initialization(format!("HTTP client: {e}")))?,
            ),
        };

        let executor = Arc::new(RequestExecutor::new(
            registry.clone(),
            transport,
            config.executor_config(),
            metrics.clone(),
        ));
        let resolver = Arc::new(DualSourceResolver::new(executor.clone(), metrics.clone()));
        let prober =
            Arc::new(HealthProber::new(executor.clone(), metrics.clone(), config.prober_config()));

        let cache = Arc::new(ResponseCache::new(config.cache_config()));
        let revalidator = Arc::new(Revalidator::new(cache.clone(), metrics.clone()));
        debug!(max_entries = cache.config().max_entries, "response cache initialized");

        let components = WaypointComponents::new(
            metrics,
            registry,
            executor,
            resolver,
            prober,
            cache,
            revalidator,
        );
        let runtime =
            WaypointRuntime::new(components, shutdown_tx, config, self.options.enable_prober);

        info!("waypoint runtime initialization complete");

        Ok(runtime)
    }
}

impl Default for WaypointRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
