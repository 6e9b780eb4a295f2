//! Candidate selection over a service's current health state.
//!
//! Selection ranks endpoints by `(consecutive_failures, smoothed_latency_ms)`, keeps
//! the best `rotation_width` of them and rotates between those across calls so that
//! a close second keeps receiving traffic. Quarantine is lifted lazily here: there is
//! no timer, a quarantined endpoint whose cooldown has elapsed gets its counter reset
//! the next time a caller selects from its service.

use std::sync::{atomic::Ordering, Arc};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{endpoint::Endpoint, registry::Service};

struct Ranked {
    endpoint: Arc<Endpoint>,
    failures: u32,
    latency_ms: f64,
}

/// Returns the ordered candidate list for the next call against `service`.
#[must_use]
pub fn select_candidates(service: &Service) -> Vec<Arc<Endpoint>> {
    select_candidates_at(service, Instant::now())
}

/// Same as [`select_candidates`] with an explicit clock reading.
///
/// Never returns an empty list for a service with at least one endpoint: when
/// every endpoint is quarantined all failure counters are reset.
#[must_use]
pub fn select_candidates_at(service: &Service, now: Instant) -> Vec<Arc<Endpoint>> {
    let policy = service.policy();
    let mut healthy = Vec::with_capacity(service.endpoints().len());

    for endpoint in service.endpoints() {
        let (eligible, recovered, failures, latency_ms) = endpoint.with_health(|h| {
            let mut recovered = false;
            if h.is_quarantined(policy) {
                if !h.cooldown_elapsed(policy, now) {
                    return (false, false, h.consecutive_failures(), 0.0);
                }
                h.reset_failures();
                recovered = true;
            }
            (true, recovered, h.consecutive_failures(), h.smoothed_latency_ms().unwrap_or(0.0))
        });

        if recovered {
            debug!(
                service = %service.name(),
                endpoint = %endpoint.url(),
                "cooldown elapsed, endpoint eligible again"
            );
        }
        if eligible {
            healthy.push(Ranked { endpoint: endpoint.clone(), failures, latency_ms });
        }
    }

    if healthy.is_empty() {
        warn!(
            service = %service.name(),
            endpoints = service.endpoints().len(),
            "all endpoints quarantined, resetting failure counters"
        );
        for endpoint in service.endpoints() {
            let latency_ms = endpoint.with_health(|h| {
                h.reset_failures();
                h.smoothed_latency_ms().unwrap_or(0.0)
            });
            healthy.push(Ranked { endpoint: endpoint.clone(), failures: 0, latency_ms });
        }
    }

    // Stable sort keeps configuration order among ties.
    healthy.sort_by(|a, b| {
        a.failures.cmp(&b.failures).then_with(|| a.latency_ms.total_cmp(&b.latency_ms))
    });

    let width = policy.rotation_width.max(1).min(healthy.len());
    healthy.truncate(width);
    if width > 1 {
        let offset = service.rotation.fetch_add(1, Ordering::Relaxed) % width;
        healthy.rotate_left(offset);
    }

    healthy.into_iter().map(|r| r.endpoint).collect()
}
