//! Keyed cache-or-fetch with per-key expiry

use super::types::{CacheEntry, CacheInfo, CacheSettings, ExpiryPolicy};
use crate::metrics;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Time-bounded cache wrapping an arbitrary fetch operation
///
/// Lookups and stores are individually atomic, but no lock is held while
/// the fetch runs: two callers missing on the same cold key may both fetch.
/// Enable `single_flight` in [`CacheSettings`] to serialize misses per key.
pub struct CacheManager<V> {
    name: String,
    entries: DashMap<String, CacheEntry<V>>,
    settings: CacheSettings,
    flights: DashMap<String, Arc<Mutex<()>>>,
}

impl<V> CacheManager<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, settings: CacheSettings) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
            settings,
            flights: DashMap::new(),
        }
    }

    /// Cache with the given default duration and default policy
    pub fn with_duration(name: impl Into<String>, default_duration: Duration) -> Self {
        Self::new(name, CacheSettings::with_duration(default_duration))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_duration(&self) -> Duration {
        self.settings.default_duration
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the cached value for `key`, or run `fetch` and cache its result
    ///
    /// A fresh hit never invokes `fetch`. A fetch error is returned unchanged
    /// and leaves the cache untouched.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: &str,
        fetch: F,
        cache_duration: Option<Duration>,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let duration = self.override_or_default(cache_duration);

        if let Some(value) = self.lookup(key, self.normalize(cache_duration)) {
            metrics::record_cache_event(&self.name, "hit");
            return Ok(value);
        }

        if !self.settings.single_flight {
            return self.fetch_and_store(key, fetch, duration).await;
        }

        let flight = self
            .flights
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = flight.lock().await;

        // Another caller may have filled the key while we waited
        if let Some(value) = self.lookup(key, self.normalize(cache_duration)) {
            metrics::record_cache_event(&self.name, "hit");
            return Ok(value);
        }

        self.fetch_and_store(key, fetch, duration).await
    }

    /// `get_or_fetch` for an ordinary (non-async) fetch function
    pub async fn get_or_fetch_sync<F, E>(
        &self,
        key: &str,
        fetch: F,
        cache_duration: Option<Duration>,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        self.get_or_fetch(key, move || std::future::ready(fetch()), cache_duration)
            .await
    }

    async fn fetch_and_store<F, Fut, E>(&self, key: &str, fetch: F, duration: Duration) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        metrics::record_cache_event(&self.name, "miss");
        debug!(cache = %self.name, key = %key, "Cache miss, fetching");

        match fetch().await {
            Ok(value) => {
                self.entries
                    .insert(key.to_string(), CacheEntry::new(value.clone(), duration));
                Ok(value)
            }
            Err(e) => {
                metrics::record_cache_event(&self.name, "fetch_error");
                Err(e)
            }
        }
    }

    /// Cached value if present and fresh under the default duration
    pub fn get(&self, key: &str) -> Option<V> {
        self.lookup(key, None)
    }

    /// Insert or overwrite `key`
    pub fn set(&self, key: &str, value: V, cache_duration: Option<Duration>) {
        let duration = self.override_or_default(cache_duration);
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, duration));
    }

    /// Remove every entry, or every entry whose key contains `pattern`
    ///
    /// Returns the number of removed entries.
    pub fn invalidate_cache(&self, pattern: Option<&str>) -> usize {
        let before = self.entries.len();
        match pattern {
            Some(pattern) => self.entries.retain(|key, _| !key.contains(pattern)),
            None => self.entries.clear(),
        }
        let removed = before.saturating_sub(self.entries.len());
        self.prune_flights();

        if removed > 0 {
            metrics::record_cache_eviction(&self.name, removed);
        }
        info!(
            cache = %self.name,
            pattern = pattern.unwrap_or("*"),
            removed,
            "Cache invalidated"
        );
        removed
    }

    /// Snapshot of the cache contents; does not evict
    pub fn get_cache_info(&self) -> CacheInfo {
        let now = Instant::now();
        let mut valid_items = 0;
        let mut expired_items = 0;
        let mut keys = Vec::with_capacity(self.entries.len());

        for entry in self.entries.iter() {
            if entry.value().is_fresh(now, self.check_duration(entry.value(), None)) {
                valid_items += 1;
            } else {
                expired_items += 1;
            }
            keys.push(entry.key().clone());
        }
        keys.sort_unstable();

        CacheInfo {
            total_items: keys.len(),
            valid_items,
            expired_items,
            keys,
            default_duration: self.settings.default_duration.as_secs(),
        }
    }

    /// Remove expired entries, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.is_fresh(now, self.check_duration(entry, None)));
        let removed = before.saturating_sub(self.entries.len());
        self.prune_flights();

        if removed > 0 {
            metrics::record_cache_eviction(&self.name, removed);
            debug!(cache = %self.name, removed, "Expired cache entries removed");
        }
        removed
    }

    /// Drop every entry; called at shutdown
    pub fn flush(&self) {
        let removed = self.invalidate_cache(None);
        info!(cache = %self.name, removed, "Cache flushed");
    }

    /// Run `cleanup_expired` every `interval` until `shutdown` resolves
    pub fn spawn_cleanup_task<S>(self: Arc<Self>, interval: Duration, shutdown: S) -> tokio::task::JoinHandle<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        info!(cache = %self.name, "Starting cache cleanup task (interval: {:?})", interval);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick completes immediately
            ticker.tick().await;
            tokio::pin!(shutdown);

            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        debug!(cache = %self.name, "Cache cleanup task stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.cleanup_expired();
                    }
                }
            }
        })
    }

    fn lookup(&self, key: &str, cache_duration: Option<Duration>) -> Option<V> {
        let now = Instant::now();
        let entry = self.entries.get(key)?;
        let duration = self.check_duration(entry.value(), cache_duration);
        entry
            .value()
            .is_fresh(now, duration)
            .then(|| entry.value().value.clone())
    }

    fn check_duration(&self, entry: &CacheEntry<V>, cache_duration: Option<Duration>) -> Duration {
        match (cache_duration, self.settings.expiry_policy) {
            (Some(duration), _) => duration,
            (None, ExpiryPolicy::CallerDuration) => self.settings.default_duration,
            (None, ExpiryPolicy::PerEntry) => entry.ttl,
        }
    }

    /// A zero override means "use the default"
    fn normalize(&self, cache_duration: Option<Duration>) -> Option<Duration> {
        cache_duration.filter(|d| !d.is_zero())
    }

    fn override_or_default(&self, cache_duration: Option<Duration>) -> Duration {
        self.normalize(cache_duration)
            .unwrap_or(self.settings.default_duration)
    }

    fn prune_flights(&self) {
        if self.settings.single_flight {
            self.flights
                .retain(|key, lock| Arc::strong_count(lock) > 1 || self.entries.contains_key(key));
        }
    }
}
