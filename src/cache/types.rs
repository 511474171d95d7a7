//! Cache manager type definitions

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Default entry lifetime when configuration does not provide one
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(600);

/// Which duration decides whether an entry is still fresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// The checking call's duration: `get_or_fetch` uses its override (or the
    /// default), every other operation uses the manager default
    #[default]
    CallerDuration,
    /// Each entry keeps the duration it was stored with and every check
    /// honors it; a `get_or_fetch` override still wins for that call
    PerEntry,
}

/// Construction-time cache settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub default_duration: Duration,
    pub expiry_policy: ExpiryPolicy,
    /// Serialize misses per key so only one fetch runs for a cold key
    pub single_flight: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_duration: DEFAULT_CACHE_DURATION,
            expiry_policy: ExpiryPolicy::default(),
            single_flight: false,
        }
    }
}

impl CacheSettings {
    pub fn with_duration(default_duration: Duration) -> Self {
        Self {
            default_duration,
            ..Self::default()
        }
    }
}

/// Cached value with the time it was stored
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub inserted_at: Instant,
    /// Duration in effect when the entry was stored
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.inserted_at)
    }

    /// Fresh while `age < duration`
    pub fn is_fresh(&self, now: Instant, duration: Duration) -> bool {
        self.age(now) < duration
    }
}

/// Diagnostic snapshot returned by `get_cache_info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub total_items: usize,
    pub valid_items: usize,
    pub expired_items: usize,
    pub keys: Vec<String>,
    /// Default duration in seconds
    pub default_duration: u64,
}
