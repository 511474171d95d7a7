//! Time-bounded cache-or-fetch
//!
//! A [`CacheManager`] wraps any fetch operation (a database lookup, a
//! computed prompt) and serves the stored value until it is older than the
//! configured duration.

mod manager;
mod types;

pub use manager::CacheManager;
pub use types::{CacheEntry, CacheInfo, CacheSettings, ExpiryPolicy, DEFAULT_CACHE_DURATION};
