//! Metrics collection for engine monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Engine metrics, shared by the aggregator and the fiat resolver.
pub struct EngineMetrics {
    /// Total consensus aggregations attempted.
    pub aggregations_total: AtomicU64,
    /// Aggregations that failed with no usable rate.
    pub aggregations_failed: AtomicU64,
    /// Individual provider call failures.
    pub provider_errors: AtomicU64,
    /// Quotes rejected as outliers.
    pub outliers_rejected: AtomicU64,
    /// Consensus rates served from cache.
    pub cache_hits: AtomicU64,
    /// Consensus cache misses.
    pub cache_misses: AtomicU64,
    /// Aggregations served from rate history.
    pub historical_fallbacks: AtomicU64,
    /// Fiat resolutions requested.
    pub fiat_resolutions: AtomicU64,
    /// Fiat rates served fresh from cache.
    pub fiat_cache_hits: AtomicU64,
    /// Fiat rates served stale from cache.
    pub fiat_stale_hits: AtomicU64,
    /// Background revalidations spawned.
    pub revalidations: AtomicU64,
    /// Fiat resolutions served from rate history.
    pub fiat_fallbacks: AtomicU64,
}

impl EngineMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            aggregations_total: AtomicU64::new(0),
            aggregations_failed: AtomicU64::new(0),
            provider_errors: AtomicU64::new(0),
            outliers_rejected: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            historical_fallbacks: AtomicU64::new(0),
            fiat_resolutions: AtomicU64::new(0),
            fiat_cache_hits: AtomicU64::new(0),
            fiat_stale_hits: AtomicU64::new(0),
            revalidations: AtomicU64::new(0),
            fiat_fallbacks: AtomicU64::new(0),
        }
    }

    /// Record a successful aggregation.
    pub fn aggregation_succeeded(&self) {
        self.aggregations_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an aggregation with no usable rate.
    pub fn aggregation_failed(&self) {
        self.aggregations_total.fetch_add(1, Ordering::Relaxed);
        self.aggregations_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Add a batch of provider failures.
    pub fn provider_errors_add(&self, count: u64) {
        self.provider_errors.fetch_add(count, Ordering::Relaxed);
    }

    /// Add a batch of rejected outliers.
    pub fn outliers_rejected_add(&self, count: u64) {
        self.outliers_rejected.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a consensus cache hit.
    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a consensus cache miss.
    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an aggregation served from rate history.
    pub fn historical_fallback(&self) {
        self.historical_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fiat resolution request.
    pub fn fiat_resolution(&self) {
        self.fiat_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fresh fiat cache hit.
    pub fn fiat_cache_hit(&self) {
        self.fiat_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stale fiat cache hit.
    pub fn fiat_stale_hit(&self) {
        self.fiat_stale_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a spawned background revalidation.
    pub fn revalidation_spawned(&self) {
        self.revalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fiat resolution served from rate history.
    pub fn fiat_fallback(&self) {
        self.fiat_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            aggregations_total: self.aggregations_total.load(Ordering::Relaxed),
            aggregations_failed: self.aggregations_failed.load(Ordering::Relaxed),
            provider_errors: self.provider_errors.load(Ordering::Relaxed),
            outliers_rejected: self.outliers_rejected.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            historical_fallbacks: self.historical_fallbacks.load(Ordering::Relaxed),
            fiat_resolutions: self.fiat_resolutions.load(Ordering::Relaxed),
            fiat_cache_hits: self.fiat_cache_hits.load(Ordering::Relaxed),
            fiat_stale_hits: self.fiat_stale_hits.load(Ordering::Relaxed),
            revalidations: self.revalidations.load(Ordering::Relaxed),
            fiat_fallbacks: self.fiat_fallbacks.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP ratequorum_aggregations_total Total consensus aggregations attempted
# TYPE ratequorum_aggregations_total counter
ratequorum_aggregations_total {}

# HELP ratequorum_aggregations_failed Total aggregations with no usable rate
# TYPE ratequorum_aggregations_failed counter
ratequorum_aggregations_failed {}

# HELP ratequorum_provider_errors Total individual provider call failures
# TYPE ratequorum_provider_errors counter
ratequorum_provider_errors {}

# HELP ratequorum_outliers_rejected Total quotes rejected as outliers
# TYPE ratequorum_outliers_rejected counter
ratequorum_outliers_rejected {}

# HELP ratequorum_cache_hits Total consensus rates served from cache
# TYPE ratequorum_cache_hits counter
ratequorum_cache_hits {}

# HELP ratequorum_cache_misses Total consensus cache misses
# TYPE ratequorum_cache_misses counter
ratequorum_cache_misses {}

# HELP ratequorum_historical_fallbacks Total aggregations served from rate history
# TYPE ratequorum_historical_fallbacks counter
ratequorum_historical_fallbacks {}

# HELP ratequorum_fiat_resolutions Total fiat resolutions requested
# TYPE ratequorum_fiat_resolutions counter
ratequorum_fiat_resolutions {}

# HELP ratequorum_fiat_cache_hits Total fiat rates served fresh from cache
# TYPE ratequorum_fiat_cache_hits counter
ratequorum_fiat_cache_hits {}

# HELP ratequorum_fiat_stale_hits Total fiat rates served stale from cache
# TYPE ratequorum_fiat_stale_hits counter
ratequorum_fiat_stale_hits {}

# HELP ratequorum_revalidations Total background revalidations spawned
# TYPE ratequorum_revalidations counter
ratequorum_revalidations {}

# HELP ratequorum_fiat_fallbacks Total fiat resolutions served from rate history
# TYPE ratequorum_fiat_fallbacks counter
ratequorum_fiat_fallbacks {}
"#,
            snapshot.aggregations_total,
            snapshot.aggregations_failed,
            snapshot.provider_errors,
            snapshot.outliers_rejected,
            snapshot.cache_hits,
            snapshot.cache_misses,
            snapshot.historical_fallbacks,
            snapshot.fiat_resolutions,
            snapshot.fiat_cache_hits,
            snapshot.fiat_stale_hits,
            snapshot.revalidations,
            snapshot.fiat_fallbacks,
        )
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub aggregations_total: u64,
    pub aggregations_failed: u64,
    pub provider_errors: u64,
    pub outliers_rejected: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub historical_fallbacks: u64,
    pub fiat_resolutions: u64,
    pub fiat_cache_hits: u64,
    pub fiat_stale_hits: u64,
    pub revalidations: u64,
    pub fiat_fallbacks: u64,
}

/// Shared metrics instance.
pub type SharedEngineMetrics = Arc<EngineMetrics>;
