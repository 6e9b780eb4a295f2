//! Static registry of logical services and their redundant endpoints.

use dashmap::DashMap;
use std::sync::{atomic::AtomicUsize, Arc};
use tokio::time::Instant;
use tracing::info;

use super::{
    endpoint::Endpoint,
    errors::UpstreamError,
    health::{HealthPolicy, HealthSnapshot, ServiceSnapshot},
};

/// Default path used by the prober when a service does not configure one.
pub const DEFAULT_LIVENESS_PATH: &str = "/";

/// Endpoints of one logical service plus the shared rotation index used by selection.
#[derive(Debug)]
pub struct Service {
    name: Arc<str>,
    endpoints: Vec<Arc<Endpoint>>,
    policy: Arc<HealthPolicy>,
    liveness_path: String,
    pub(crate) rotation: AtomicUsize,
}

impl Service {
    /// Creates a service from its endpoint URLs.
    ///
    /// Duplicate URLs are collapsed since the URL is the endpoint identity.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::NoEndpoints`] if `urls` is empty.
    pub fn new<I, S>(
        name: &str,
        urls: I,
        liveness_path: Option<String>,
        policy: Arc<HealthPolicy>,
    ) -> Result<Self, UpstreamError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut endpoints: Vec<Arc<Endpoint>> = Vec::new();
        for url in urls {
            let url = url.as_ref().trim_end_matches('/');
            if !endpoints.iter().any(|e| e.url().as_ref() == url) {
                endpoints.push(Arc::new(Endpoint::new(url)));
            }
        }

        if endpoints.is_empty() {
            return Err(UpstreamError::NoEndpoints(name.to_string()));
        }

        Ok(Self {
            name: Arc::from(name),
            endpoints,
            policy,
            liveness_path: liveness_path.unwrap_or_else(|| DEFAULT_LIVENESS_PATH.to_string()),
            rotation: AtomicUsize::new(0),
        })
    }

    #[must_use]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    #[must_use]
    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    #[must_use]
    pub fn endpoint(&self, url: &str) -> Option<&Arc<Endpoint>> {
        self.endpoints.iter().find(|e| e.url().as_ref() == url)
    }

    #[must_use]
    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    #[must_use]
    pub fn liveness_path(&self) -> &str {
        &self.liveness_path
    }

    #[must_use]
    pub fn snapshot(&self, now: Instant) -> ServiceSnapshot {
        ServiceSnapshot::new(
            self.name.to_string(),
            self.endpoints.iter().map(|e| e.snapshot(&self.policy, now)).collect(),
        )
    }
}

/// All logical services known to the process.
///
/// Owned by the runtime and shared by `Arc` with executors, the resolver and the
/// prober. Services are registered at construction time and never removed.
#[derive(Debug, Default)]
pub struct Registry {
    services: DashMap<Arc<str>, Arc<Service>>,
    policy: Arc<HealthPolicy>,
}

impl Registry {
    #[must_use]
    pub fn new(policy: HealthPolicy) -> Self {
        Self { services: DashMap::new(), policy: Arc::new(policy) }
    }

    #[must_use]
    pub fn policy(&self) -> &Arc<HealthPolicy> {
        &self.policy
    }

    /// Registers a service. Re-registering a name replaces its endpoint set.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::NoEndpoints`] if `urls` is empty.
    pub fn register<I, S>(
        &self,
        name: &str,
        urls: I,
        liveness_path: Option<String>,
    ) -> Result<Arc<Service>, UpstreamError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let service = Arc::new(Service::new(name, urls, liveness_path, self.policy.clone())?);
        info!(
            service = %name,
            endpoints = service.endpoints().len(),
            liveness_path = service.liveness_path(),
            "service registered"
        );
        self.services.insert(service.name().clone(), service.clone());
        Ok(service)
    }

    /// Looks up a service by name.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::UnknownService`] if no such service is registered.
    pub fn service(&self, name: &str) -> Result<Arc<Service>, UpstreamError> {
        self.services
            .get(name)
            .map(|s| s.value().clone())
            .ok_or_else(|| UpstreamError::UnknownService(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Returns all services sorted by name.
    #[must_use]
    pub fn services(&self) -> Vec<Arc<Service>> {
        let mut services: Vec<_> = self.services.iter().map(|s| s.value().clone()).collect();
        services.sort_by(|a, b| a.name().cmp(b.name()));
        services
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Per-endpoint diagnostic view of every registered service.
    #[must_use]
    pub fn health_snapshot(&self) -> HealthSnapshot {
        let now = Instant::now();
        HealthSnapshot {
            generated_at: chrono::Utc::now(),
            services: self.services().iter().map(|s| s.snapshot(now)).collect(),
        }
    }
}
