//! Generic key/value cache store with TTL support.

use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use ratequorum_common::{age_of, now, RateError, RateResult, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};
use tracing::debug;

/// A cached rate carrying the time it was written.
///
/// The engine, not the backend, decides freshness tiers from `cached_at`;
/// the backend TTL only bounds how long the entry exists at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached rate.
    pub rate: Decimal,
    /// When the rate was fetched.
    pub cached_at: Timestamp,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn new(rate: Decimal) -> Self {
        Self {
            rate,
            cached_at: now(),
        }
    }

    /// Create an entry with an explicit write time.
    pub fn with_timestamp(rate: Decimal, cached_at: Timestamp) -> Self {
        Self { rate, cached_at }
    }

    /// How long ago the entry was written.
    pub fn age(&self) -> Duration {
        age_of(self.cached_at)
    }

    /// Encode for a string-valued cache backend.
    pub fn to_json(&self) -> RateResult<String> {
        serde_json::to_string(self).map_err(|e| RateError::Store(e.to_string()))
    }

    /// Decode from a string-valued cache backend.
    pub fn from_json(value: &str) -> RateResult<Self> {
        serde_json::from_str(value).map_err(|e| RateError::Store(e.to_string()))
    }
}

/// Key/value store with per-key TTL, as a cache backend presents it.
///
/// Values are opaque strings; callers own the encoding. An expired or
/// absent key is `None`; the backend never distinguishes the two.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value if present and unexpired.
    async fn get(&self, key: &str) -> RateResult<Option<String>>;

    /// Set a value, expiring after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: StdDuration) -> RateResult<()>;

    /// Delete a value.
    async fn del(&self, key: &str) -> RateResult<()>;
}

/// Shared cache store handle.
pub type SharedCacheStore = Arc<dyn CacheStore>;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

impl StoredValue {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// In-memory cache store backed by a concurrent map.
///
/// Expired entries are dropped lazily on read; a periodic sweep can call
/// [`MemoryCacheStore::evict_expired`] to reclaim untouched keys.
pub struct MemoryCacheStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Drop every expired entry.
    pub fn evict_expired(&self) {
        self.entries.retain(|_, stored| stored.is_valid());
    }

    /// Number of entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> RateResult<Option<String>> {
        if let Some(stored) = self.entries.get(key) {
            if stored.is_valid() {
                return Ok(Some(stored.value.clone()));
            }
            debug!(key = %key, "Cache entry expired");
            drop(stored);
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: StdDuration) -> RateResult<()> {
        let stored = StoredValue {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.to_string(), stored);
        Ok(())
    }

    async fn del(&self, key: &str) -> RateResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryCacheStore::new();
        store
            .set("rate:BTC-USD", "50000".to_string(), StdDuration::from_secs(60))
            .await
            .unwrap();

        let value = store.get("rate:BTC-USD").await.unwrap();
        assert_eq!(value.as_deref(), Some("50000"));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = MemoryCacheStore::new();
        assert!(store.get("rate:BTC-USD").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = MemoryCacheStore::new();
        store
            .set("rate:BTC-USD", "50000".to_string(), StdDuration::from_millis(40))
            .await
            .unwrap();

        assert!(store.get("rate:BTC-USD").await.unwrap().is_some());

        tokio::time::sleep(StdDuration::from_millis(60)).await;

        assert!(store.get("rate:BTC-USD").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_del() {
        let store = MemoryCacheStore::new();
        store
            .set("fiat-rate:USD-NGN", "x".to_string(), StdDuration::from_secs(60))
            .await
            .unwrap();

        store.del("fiat-rate:USD-NGN").await.unwrap();
        assert!(store.get("fiat-rate:USD-NGN").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_evict_expired() {
        let store = MemoryCacheStore::new();
        store
            .set("a", "1".to_string(), StdDuration::from_millis(20))
            .await
            .unwrap();
        store
            .set("b", "2".to_string(), StdDuration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(StdDuration::from_millis(40)).await;
        store.evict_expired();

        assert_eq!(store.len(), 1);
        assert!(store.get("b").await.unwrap().is_some());
    }

    #[test]
    fn test_cache_entry_round_trip() {
        let entry = CacheEntry::new(dec!(1520.5));
        let json = entry.to_json().unwrap();
        let back = CacheEntry::from_json(&json).unwrap();

        assert_eq!(back, entry);
    }

    #[test]
    fn test_cache_entry_age() {
        let entry = CacheEntry::with_timestamp(dec!(1), now() - Duration::seconds(90));
        assert!(entry.age() >= Duration::seconds(90));
    }
}
