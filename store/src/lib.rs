//! RateQuorum Stores
//!
//! Backends the engine resolves rates against: a generic TTL'd key/value
//! cache and an append-only rate history store, each behind a trait with
//! an in-memory implementation, plus a Postgres history store.

pub mod cache;
pub mod history;
pub mod postgres;

pub use cache::{CacheEntry, CacheStore, MemoryCacheStore, SharedCacheStore};
pub use history::{MemoryRateHistoryStore, RateHistoryStore, SharedRateHistoryStore};
pub use postgres::PgRateHistoryStore;
