//! # Response Cache
//!
//! Short-TTL, in-memory cache of the last known-good payload per request key.
//!
//! Entries are never expired by age: a stale entry is still the best answer
//! available and callers show it while a refresh runs (see [`revalidate`]).
//! Freshness only decides whether a network call is needed at all.
//!
//! ## Overwrite rule
//!
//! A fetch result replaces an entry only when the fetch *started* after the one
//! that produced the current entry. A slow refresh that loses a race against a
//! newer one can therefore never roll the cache back. Failed fetches never touch
//! the cache.
//!
//! ## Bounds
//!
//! The cache holds at most `max_entries` keys. Inserting a new key into a full
//! cache evicts the entry with the oldest `stored_at`.

pub mod revalidate;

use bytes::Bytes;
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tokio::time::Instant;
use tracing::trace;

pub use revalidate::{Lookup, Revalidator};

/// Cache sizing and default freshness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Freshness window used when a caller does not pass its own TTL.
    pub fresh_window: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { fresh_window: Duration::from_secs(10), max_entries: 1024 }
    }
}

/// Last known-good payload for one key.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: String,
    pub payload: T,
    pub stored_at: Instant,
    /// When the fetch that produced `payload` started; orders competing writes.
    pub fetched_at: Instant,
    pub fresh_window: Duration,
}

impl<T> CacheEntry<T> {
    #[must_use]
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    /// Fresh against the window recorded with the entry.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        is_fresh(self, self.fresh_window)
    }
}

/// Returns `true` if `entry` is younger than `ttl`.
///
/// A zero TTL is never fresh; any positive TTL is fresh right after `put`.
#[must_use]
pub fn is_fresh<T>(entry: &CacheEntry<T>, ttl: Duration) -> bool {
    entry.age() < ttl
}

/// A cached HTTP body together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBody {
    pub body: Bytes,
    /// Endpoint URL or source kind that produced the body.
    pub origin: String,
}

#[derive(Debug, Default)]
struct CacheStats {
    fresh_hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    refresh_failures: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub entries: usize,
    pub fresh_hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub refresh_failures: u64,
    pub evictions: u64,
}

/// Concurrent key/value cache of last successful payloads.
#[derive(Debug)]
pub struct ResponseCache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    config: CacheConfig,
    stats: CacheStats,
}

impl<T: Clone> ResponseCache<T> {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self { entries: DashMap::new(), config, stats: CacheStats::default() }
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns a copy of the entry for `key`, fresh or not.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Stores `payload` under `key` with the default freshness window.
    pub fn put(&self, key: &str, payload: T) {
        self.put_with_window(key, payload, self.config.fresh_window);
    }

    /// Stores `payload` under `key` unconditionally.
    pub fn put_with_window(&self, key: &str, payload: T, fresh_window: Duration) {
        let now = Instant::now();
        self.make_room_for(key);
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                payload,
                stored_at: now,
                fetched_at: now,
                fresh_window,
            },
        );
    }

    /// Stores the result of a fetch that started at `fetched_at`, fresh for
    /// `fresh_window`.
    ///
    /// Returns `false` (and leaves the cache untouched) if the current entry came
    /// from a fetch that started at the same time or later.
    pub fn store_fetched(
        &self,
        key: &str,
        payload: T,
        fetched_at: Instant,
        fresh_window: Duration,
    ) -> bool {
        self.make_room_for(key);
        let entry = CacheEntry {
            key: key.to_string(),
            payload,
            stored_at: Instant::now(),
            fetched_at,
            fresh_window,
        };

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().fetched_at >= fetched_at {
                    trace!(key, "discarding result of an older fetch");
                    return false;
                }
                occupied.insert(entry);
                true
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                true
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<CacheEntry<T>> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Must not be called while holding a shard guard of `entries`.
    fn make_room_for(&self, key: &str) {
        if self.config.max_entries == 0 || self.entries.contains_key(key) {
            return;
        }
        while self.entries.len() >= self.config.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().stored_at)
                .map(|e| e.key().clone());
            match oldest {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                    trace!(key = %oldest, "evicted oldest cache entry");
                }
                None => break,
            }
        }
    }

    pub(crate) fn record_fresh_hit(&self) {
        self.stats.fresh_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_hit(&self) {
        self.stats.stale_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_refresh_failure(&self) {
        self.stats.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            entries: self.entries.len(),
            fresh_hits: self.stats.fresh_hits.load(Ordering::Relaxed),
            stale_hits: self.stats.stale_hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            refresh_failures: self.stats.refresh_failures.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
        }
    }
}
