//! Stale-while-revalidate on top of [`ResponseCache`].
//!
//! | Cache state | Returned          | Network                                   |
//! |-------------|-------------------|-------------------------------------------|
//! | fresh       | cached payload    | none                                      |
//! | stale       | cached payload    | one background refresh per key            |
//! | empty       | fetched payload   | foreground fetch, errors reach the caller |

use dashmap::DashSet;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, warn};

use super::{is_fresh, ResponseCache};
use crate::{
    metrics::{CacheStatus, MetricsCollector},
    upstream::errors::UpstreamError,
};

/// Result of a revalidating lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// Cached and within the freshness window; no network call was made.
    Fresh(T),
    /// Cached but stale; a background refresh may be running.
    Stale(T),
    /// Not cached; fetched in the foreground.
    Fetched(T),
}

impl<T> Lookup<T> {
    #[must_use]
    pub fn value(&self) -> &T {
        match self {
            Self::Fresh(v) | Self::Stale(v) | Self::Fetched(v) => v,
        }
    }

    #[must_use]
    pub fn into_value(self) -> T {
        match self {
            Self::Fresh(v) | Self::Stale(v) | Self::Fetched(v) => v,
        }
    }

    #[must_use]
    pub fn status(&self) -> CacheStatus {
        match self {
            Self::Fresh(_) => CacheStatus::Fresh,
            Self::Stale(_) => CacheStatus::Stale,
            Self::Fetched(_) => CacheStatus::Miss,
        }
    }
}

/// RAII marker for a background refresh in progress.
///
/// Created only when no refresh for the same key is running; removes the key
/// from the in-flight set on drop, including when the refresh task panics.
struct InFlightGuard {
    in_flight: Arc<DashSet<String>>,
    key: String,
}

impl InFlightGuard {
    fn try_acquire(in_flight: &Arc<DashSet<String>>, key: &str) -> Option<Self> {
        in_flight
            .insert(key.to_string())
            .then(|| Self { in_flight: Arc::clone(in_flight), key: key.to_string() })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

/// Applies the stale-while-revalidate policy for one payload type.
pub struct Revalidator<T> {
    cache: Arc<ResponseCache<T>>,
    in_flight: Arc<DashSet<String>>,
    metrics: Arc<MetricsCollector>,
}

impl<T> Revalidator<T>
where
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(cache: Arc<ResponseCache<T>>, metrics: Arc<MetricsCollector>) -> Self {
        Self { cache, in_flight: Arc::new(DashSet::new()), metrics }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache<T>> {
        &self.cache
    }

    /// Returns `true` while a background refresh for `key` is running.
    #[must_use]
    pub fn is_refreshing(&self, key: &str) -> bool {
        self.in_flight.contains(key)
    }

    /// Looks up `key`, fetching or refreshing through `fetch` as needed.
    ///
    /// `ttl` overrides the freshness window recorded on the entry (or the
    /// cache default on a miss) and is stored with the fetched payload. `fetch` is only
    /// invoked on a miss or when a stale entry has no refresh running yet.
    ///
    /// # Errors
    ///
    /// Returns the fetch error only when nothing was cached for `key`.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<Lookup<T>, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>> + Send + 'static,
    {
        if let Some(entry) = self.cache.get(key) {
            let window = ttl.unwrap_or(entry.fresh_window);
            if is_fresh(&entry, window) {
                self.cache.record_fresh_hit();
                self.metrics.record_cache_lookup(CacheStatus::Fresh);
                return Ok(Lookup::Fresh(entry.payload));
            }
            self.cache.record_stale_hit();
            self.metrics.record_cache_lookup(CacheStatus::Stale);
            let _ = self.spawn_refresh(key, window, fetch);
            return Ok(Lookup::Stale(entry.payload));
        }

        self.cache.record_miss();
        self.metrics.record_cache_lookup(CacheStatus::Miss);
        let window = ttl.unwrap_or(self.cache.config().fresh_window);
        let fetched_at = Instant::now();
        let payload = fetch().await?;
        self.cache.store_fetched(key, payload.clone(), fetched_at, window);
        self.metrics.record_cache_entries(self.cache.len());
        Ok(Lookup::Fetched(payload))
    }

    /// Starts a background refresh of `key` unless one is already running.
    ///
    /// The refreshed payload is stored only on success; a failure is logged and
    /// leaves the existing entry in place.
    pub fn spawn_refresh<F, Fut>(
        &self,
        key: &str,
        fresh_window: Duration,
        fetch: F,
    ) -> Option<JoinHandle<()>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>> + Send + 'static,
    {
        let Some(guard) = InFlightGuard::try_acquire(&self.in_flight, key) else {
            debug!(key, "refresh already in flight");
            return None;
        };

        let cache = Arc::clone(&self.cache);
        let metrics = Arc::clone(&self.metrics);
        let fetched_at = Instant::now();
        let refresh = fetch();

        Some(tokio::spawn(async move {
            match refresh.await {
                Ok(payload) => {
                    let stored = cache.store_fetched(&guard.key, payload, fetched_at, fresh_window);
                    metrics.record_cache_refresh(true);
                    debug!(key = %guard.key, stored, "background refresh complete");
                }
                Err(e) => {
                    cache.record_refresh_failure();
                    metrics.record_cache_refresh(false);
                    warn!(key = %guard.key, error = %e, "background refresh failed, keeping stale entry");
                }
            }
            drop(guard);
        }))
    }
}
