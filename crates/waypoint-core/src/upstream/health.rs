//! Per-endpoint health counters and the policy that interprets them.
//!
//! Every real request and every background probe feeds one of two updates into
//! an [`EndpointHealth`]: a success (resets the failure streak and folds the
//! observed latency into an exponential moving average) or a failure (extends
//! the streak and stamps the failure time). The [`HealthPolicy`] decides when a
//! streak turns into quarantine and when quarantine ends.

use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, time::Duration};
use tokio::time::Instant;

/// Number of recent attempt outcomes kept per endpoint for diagnostics.
pub const HEALTH_HISTORY_SIZE: usize = 32;

/// Thresholds and weights governing quarantine and ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthPolicy {
    /// Consecutive failures at which an endpoint is quarantined.
    pub max_failures: u32,
    /// Time since the last failure after which a quarantined endpoint is eligible again.
    pub cooldown: Duration,
    /// Weight of the newest sample in the latency moving average.
    pub latency_weight: f64,
    /// Number of best-ranked endpoints that selection rotates between.
    pub rotation_width: usize,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            max_failures: 3,
            cooldown: Duration::from_secs(30),
            latency_weight: 0.3,
            rotation_width: 2,
        }
    }
}

/// Outcome of a single attempt against one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Timeout,
    HttpError,
    TransportError,
}

impl AttemptOutcome {
    /// Returns a static string representation for metrics labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Timeout => "timeout",
            Self::HttpError => "http_error",
            Self::TransportError => "transport_error",
        }
    }
}

/// One entry of the per-endpoint outcome ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthHistoryEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub outcome: AttemptOutcome,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

/// Mutable health state of one endpoint.
///
/// Not synchronized on its own; [`Endpoint`](super::endpoint::Endpoint) keeps it
/// behind a mutex so that every update is a single critical section.
#[derive(Debug, Default)]
pub struct EndpointHealth {
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    last_success_at: Option<Instant>,
    smoothed_latency_ms: Option<f64>,
    total_successes: u64,
    total_failures: u64,
    total_timeouts: u64,
    last_error: Option<String>,
    last_outcome: Option<AttemptOutcome>,
    history: VecDeque<HealthHistoryEntry>,
}

impl EndpointHealth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful attempt.
    ///
    /// Resets the failure streak and updates the moving average as
    /// `weight * latency + (1 - weight) * previous`, seeding it with the first sample.
    pub fn record_success(&mut self, latency: Duration, weight: f64, now: Instant) {
        #[allow(clippy::cast_precision_loss)]
        let latency_ms = latency.as_micros() as f64 / 1000.0;
        self.smoothed_latency_ms = Some(match self.smoothed_latency_ms {
            Some(previous) => weight * latency_ms + (1.0 - weight) * previous,
            None => latency_ms,
        });
        self.consecutive_failures = 0;
        self.last_success_at = Some(now);
        self.total_successes += 1;
        self.last_outcome = Some(AttemptOutcome::Success);
        self.push_history(AttemptOutcome::Success, Some(latency.as_millis() as u64), None);
    }

    /// Records a failed attempt.
    pub fn record_failure(&mut self, outcome: AttemptOutcome, error: Option<String>, now: Instant) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(now);
        self.total_failures += 1;
        if outcome == AttemptOutcome::Timeout {
            self.total_timeouts += 1;
        }
        self.last_outcome = Some(outcome);
        self.last_error.clone_from(&error);
        self.push_history(outcome, None, error);
    }

    fn push_history(
        &mut self,
        outcome: AttemptOutcome,
        latency_ms: Option<u64>,
        error: Option<String>,
    ) {
        self.history.push_back(HealthHistoryEntry {
            timestamp: chrono::Utc::now(),
            outcome,
            latency_ms,
            error,
        });
        if self.history.len() > HEALTH_HISTORY_SIZE {
            self.history.pop_front();
        }
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    #[must_use]
    pub fn smoothed_latency_ms(&self) -> Option<f64> {
        self.smoothed_latency_ms
    }

    #[must_use]
    pub fn last_failure_at(&self) -> Option<Instant> {
        self.last_failure_at
    }

    #[must_use]
    pub fn last_success_at(&self) -> Option<Instant> {
        self.last_success_at
    }

    /// Returns `true` while the failure streak is at or above the policy threshold.
    ///
    /// This ignores the cooldown; see [`cooldown_elapsed`](Self::cooldown_elapsed).
    #[must_use]
    pub fn is_quarantined(&self, policy: &HealthPolicy) -> bool {
        self.consecutive_failures >= policy.max_failures
    }

    /// Returns `true` once strictly more than `cooldown` has passed since the last failure.
    #[must_use]
    pub fn cooldown_elapsed(&self, policy: &HealthPolicy, now: Instant) -> bool {
        match self.last_failure_at {
            Some(at) => now.saturating_duration_since(at) > policy.cooldown,
            None => true,
        }
    }

    /// Clears the failure streak without touching latency or history.
    pub fn reset_failures(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Builds the diagnostic view of this endpoint.
    #[must_use]
    pub fn snapshot(&self, url: &str, policy: &HealthPolicy, now: Instant) -> EndpointSnapshot {
        let ago = |at: Option<Instant>| at.map(|at| now.saturating_duration_since(at).as_millis() as u64);

        EndpointSnapshot {
            url: url.to_string(),
            consecutive_failures: self.consecutive_failures,
            quarantined: self.is_quarantined(policy) && !self.cooldown_elapsed(policy, now),
            smoothed_latency_ms: self.smoothed_latency_ms,
            last_success_ms_ago: ago(self.last_success_at),
            last_failure_ms_ago: ago(self.last_failure_at),
            total_successes: self.total_successes,
            total_failures: self.total_failures,
            total_timeouts: self.total_timeouts,
            last_outcome: self.last_outcome,
            last_error: self.last_error.clone(),
            recent: self.history.iter().rev().cloned().collect(),
        }
    }
}

/// Point-in-time diagnostic view of one endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSnapshot {
    pub url: String,
    pub consecutive_failures: u32,
    /// Excluded from selection right now (failure streak at threshold, cooldown pending).
    pub quarantined: bool,
    pub smoothed_latency_ms: Option<f64>,
    pub last_success_ms_ago: Option<u64>,
    pub last_failure_ms_ago: Option<u64>,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_timeouts: u64,
    pub last_outcome: Option<AttemptOutcome>,
    pub last_error: Option<String>,
    /// Recent outcomes, newest first.
    pub recent: Vec<HealthHistoryEntry>,
}

/// Diagnostic view of every endpoint of one logical service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub name: String,
    pub available_endpoints: usize,
    pub quarantined_endpoints: usize,
    pub endpoints: Vec<EndpointSnapshot>,
}

impl ServiceSnapshot {
    #[must_use]
    pub fn new(name: String, endpoints: Vec<EndpointSnapshot>) -> Self {
        let quarantined_endpoints = endpoints.iter().filter(|e| e.quarantined).count();
        Self {
            name,
            available_endpoints: endpoints.len() - quarantined_endpoints,
            quarantined_endpoints,
            endpoints,
        }
    }
}

/// Diagnostic view of the whole registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub services: Vec<ServiceSnapshot>,
}

impl HealthSnapshot {
    /// Returns `true` when every service has at least one endpoint outside quarantine.
    #[must_use]
    pub fn all_services_available(&self) -> bool {
        self.services.iter().all(|s| s.available_endpoints > 0)
    }

    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceSnapshot> {
        self.services.iter().find(|s| s.name == name)
    }
}
