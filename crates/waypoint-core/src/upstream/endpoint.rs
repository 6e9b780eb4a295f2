use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::health::{AttemptOutcome, EndpointHealth, EndpointSnapshot, HealthPolicy};

/// One network address offering a redundant copy of a logical service.
///
/// The URL is the identity key within a service. Health is guarded by a
/// per-endpoint mutex; there is no locking across endpoints, and no lock is
/// ever held across an await point.
#[derive(Debug)]
pub struct Endpoint {
    url: Arc<str>,
    health: Mutex<EndpointHealth>,
}

impl Endpoint {
    #[must_use]
    pub fn new(url: impl Into<Arc<str>>) -> Self {
        Self { url: url.into(), health: Mutex::new(EndpointHealth::new()) }
    }

    #[must_use]
    pub fn url(&self) -> &Arc<str> {
        &self.url
    }

    /// Records a successful exchange and its latency.
    pub fn record_success(&self, latency: Duration, policy: &HealthPolicy) {
        let mut health = self.health.lock();
        let was_failing = health.consecutive_failures() > 0;
        health.record_success(latency, policy.latency_weight, Instant::now());
        drop(health);

        if was_failing {
            debug!(endpoint = %self.url, "endpoint recovered");
        }
    }

    /// Records a failed exchange.
    ///
    /// Returns `true` if this failure is the one that put the endpoint into quarantine.
    pub fn record_failure(
        &self,
        outcome: AttemptOutcome,
        error: Option<String>,
        policy: &HealthPolicy,
    ) -> bool {
        let mut health = self.health.lock();
        health.record_failure(outcome, error, Instant::now());
        let failures = health.consecutive_failures();
        drop(health);

        let entered_quarantine = failures == policy.max_failures;
        if entered_quarantine {
            warn!(
                endpoint = %self.url,
                consecutive_failures = failures,
                cooldown_secs = policy.cooldown.as_secs(),
                "endpoint quarantined"
            );
        }
        entered_quarantine
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.health.lock().consecutive_failures()
    }

    #[must_use]
    pub fn smoothed_latency_ms(&self) -> Option<f64> {
        self.health.lock().smoothed_latency_ms()
    }

    /// Returns `true` if the endpoint is currently excluded from selection.
    #[must_use]
    pub fn is_quarantined(&self, policy: &HealthPolicy, now: Instant) -> bool {
        let health = self.health.lock();
        health.is_quarantined(policy) && !health.cooldown_elapsed(policy, now)
    }

    /// Runs `f` with exclusive access to the health state.
    pub(crate) fn with_health<R>(&self, f: impl FnOnce(&mut EndpointHealth) -> R) -> R {
        f(&mut self.health.lock())
    }

    #[must_use]
    pub fn snapshot(&self, policy: &HealthPolicy, now: Instant) -> EndpointSnapshot {
        self.health.lock().snapshot(&self.url, policy, now)
    }
}
