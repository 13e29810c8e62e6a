//! Append-only rate history store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use ratequorum_common::{CurrencyPair, RateResult, RateSnapshot};
use std::sync::Arc;

/// Append-only store of rate snapshots.
///
/// The engine writes a snapshot on every successful resolution and reads
/// back the latest one as a last-resort fallback when every provider is
/// down. Snapshots are never mutated or deleted here.
#[async_trait]
pub trait RateHistoryStore: Send + Sync {
    /// Persist a snapshot.
    async fn save(&self, snapshot: &RateSnapshot) -> RateResult<()>;

    /// Most recent snapshot for a pair, if any.
    async fn find_latest(&self, pair: &CurrencyPair) -> RateResult<Option<RateSnapshot>>;

    /// Snapshots for a pair within `[from, to]`, ascending by time.
    async fn find_in_range(
        &self,
        pair: &CurrencyPair,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RateResult<Vec<RateSnapshot>>;
}

/// Shared history store handle.
pub type SharedRateHistoryStore = Arc<dyn RateHistoryStore>;

/// In-memory history store.
pub struct MemoryRateHistoryStore {
    snapshots: RwLock<Vec<RateSnapshot>>,
}

impl MemoryRateHistoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

impl Default for MemoryRateHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateHistoryStore for MemoryRateHistoryStore {
    async fn save(&self, snapshot: &RateSnapshot) -> RateResult<()> {
        self.snapshots.write().push(snapshot.clone());
        Ok(())
    }

    async fn find_latest(&self, pair: &CurrencyPair) -> RateResult<Option<RateSnapshot>> {
        let snapshots = self.snapshots.read();
        Ok(snapshots
            .iter()
            .filter(|s| &s.pair == pair)
            .max_by_key(|s| s.timestamp)
            .cloned())
    }

    async fn find_in_range(
        &self,
        pair: &CurrencyPair,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RateResult<Vec<RateSnapshot>> {
        let snapshots = self.snapshots.read();
        let mut matching: Vec<RateSnapshot> = snapshots
            .iter()
            .filter(|s| &s.pair == pair && s.timestamp >= from && s.timestamp <= to)
            .cloned()
            .collect();
        matching.sort_by_key(|s| s.timestamp);
        Ok(matching)
    }
}
