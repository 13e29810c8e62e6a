//! Stale-while-revalidate fiat rate resolution.
//!
//! Cached rates are tiered by age: fresh rates are served as-is, stale
//! rates are served immediately while one background revalidation runs,
//! and anything older goes through the provider chain synchronously. The
//! chain is ordered by preference; the first positive quote wins and is
//! cached and persisted.

use std::sync::Arc;

use dashmap::DashMap;
use ratequorum_common::{
    Currency, CurrencyPair, RateError, RateResult, RateSnapshot, SnapshotMetadata,
};
use ratequorum_providers::FiatRateProvider;
use ratequorum_store::{CacheEntry, CacheStore, RateHistoryStore};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::config::FiatResolverConfig;
use crate::metrics::EngineMetrics;

/// A resolved fiat rate with its cache provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiatRateQuote {
    /// The resolved rate.
    pub rate: Decimal,
    /// Whether the rate was served from cache.
    pub from_cache: bool,
    /// Whether the rate may be outdated.
    pub is_stale: bool,
}

impl FiatRateQuote {
    fn fresh(rate: Decimal, from_cache: bool) -> Self {
        Self {
            rate,
            from_cache,
            is_stale: false,
        }
    }
}

/// Fiat/fiat rate resolver over an ordered provider fallback chain.
pub struct FiatRateResolver {
    providers: Vec<Arc<dyn FiatRateProvider>>,
    cache: Arc<dyn CacheStore>,
    history: Arc<dyn RateHistoryStore>,
    config: FiatResolverConfig,
    revalidating: Arc<DashMap<CurrencyPair, ()>>,
    metrics: Arc<EngineMetrics>,
}

impl FiatRateResolver {
    /// Create a new resolver. Provider order is the fallback order.
    pub fn new(
        providers: Vec<Arc<dyn FiatRateProvider>>,
        cache: Arc<dyn CacheStore>,
        history: Arc<dyn RateHistoryStore>,
        config: FiatResolverConfig,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            providers,
            cache,
            history,
            config,
            revalidating: Arc::new(DashMap::new()),
            metrics,
        }
    }

    fn cache_key(pair: &CurrencyPair) -> String {
        format!("fiat-rate:{pair}")
    }

    /// Resolve a fiat/fiat rate.
    ///
    /// Identical currencies resolve to 1 without touching the cache or
    /// any provider.
    #[instrument(skip(self), fields(from = %from, to = %to))]
    pub async fn get_rate(&self, from: &Currency, to: &Currency) -> RateResult<FiatRateQuote> {
        self.validate_currency(from)?;
        self.validate_currency(to)?;
        self.metrics.fiat_resolution();

        if from == to {
            return Ok(FiatRateQuote::fresh(Decimal::ONE, false));
        }

        let pair = CurrencyPair::new(from.clone(), to.clone());

        if let Some(entry) = self.cached_entry(&pair).await {
            let age = entry.age().to_std().unwrap_or_default();

            if age < self.config.fresh_ttl {
                self.metrics.fiat_cache_hit();
                debug!(age_secs = age.as_secs(), "Fresh fiat cache hit");
                return Ok(FiatRateQuote::fresh(entry.rate, true));
            }

            if age < self.config.stale_ceiling {
                self.metrics.fiat_stale_hit();
                debug!(age_secs = age.as_secs(), "Serving stale fiat rate, revalidating");
                self.spawn_revalidation(&pair);
                return Ok(FiatRateQuote {
                    rate: entry.rate,
                    from_cache: true,
                    is_stale: true,
                });
            }

            debug!(age_secs = age.as_secs(), "Cached fiat rate too old to serve");
        }

        self.resolve_fresh(&pair).await
    }

    /// Drop the cached rate for a conversion leg.
    pub async fn invalidate_cache(&self, from: &Currency, to: &Currency) -> RateResult<()> {
        self.validate_currency(from)?;
        self.validate_currency(to)?;

        let pair = CurrencyPair::new(from.clone(), to.clone());
        self.cache.del(&Self::cache_key(&pair)).await
    }

    /// The currency allow-list.
    pub fn supported_currencies(&self) -> Vec<Currency> {
        self.config.supported_currencies.clone()
    }

    fn validate_currency(&self, currency: &Currency) -> RateResult<()> {
        if self.config.supports(currency) {
            Ok(())
        } else {
            Err(RateError::UnsupportedCurrency(currency.clone()))
        }
    }

    async fn cached_entry(&self, pair: &CurrencyPair) -> Option<CacheEntry> {
        match self.cache.get(&Self::cache_key(pair)).await {
            Ok(Some(value)) => match CacheEntry::from_json(&value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(pair = %pair, error = %e, "Discarding undecodable fiat cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(pair = %pair, error = %e, "Fiat cache read failed, treating as miss");
                None
            }
        }
    }

    /// Kick off one background revalidation for a stale pair.
    ///
    /// The guard map holds one in-flight marker per pair; concurrent stale
    /// reads piggyback on the running revalidation instead of stacking
    /// more.
    fn spawn_revalidation(&self, pair: &CurrencyPair) {
        if self.revalidating.insert(pair.clone(), ()).is_some() {
            return;
        }
        self.metrics.revalidation_spawned();

        let providers = self.providers.clone();
        let cache = Arc::clone(&self.cache);
        let history = Arc::clone(&self.history);
        let config = self.config.clone();
        let revalidating = Arc::clone(&self.revalidating);
        let pair = pair.clone();

        tokio::spawn(async move {
            debug!(pair = %pair, "Revalidating stale fiat rate");
            if let Err(e) = Self::fetch_fresh(&providers, &cache, &history, &config, &pair).await {
                warn!(pair = %pair, error = %e, "Background revalidation failed");
            }
            revalidating.remove(&pair);
        });
    }

    /// Synchronous resolution when nothing servable is cached.
    async fn resolve_fresh(&self, pair: &CurrencyPair) -> RateResult<FiatRateQuote> {
        match Self::fetch_fresh(&self.providers, &self.cache, &self.history, &self.config, pair)
            .await
        {
            Ok(rate) => Ok(FiatRateQuote::fresh(rate, false)),
            Err(_) => self.historical_fallback(pair).await,
        }
    }

    /// Walk the provider chain in order; the first positive quote is
    /// cached and persisted.
    async fn fetch_fresh(
        providers: &[Arc<dyn FiatRateProvider>],
        cache: &Arc<dyn CacheStore>,
        history: &Arc<dyn RateHistoryStore>,
        config: &FiatResolverConfig,
        pair: &CurrencyPair,
    ) -> RateResult<Decimal> {
        for provider in providers {
            match provider.get_rate(&pair.base, &pair.quote).await {
                Ok(rate) if rate > Decimal::ZERO => {
                    info!(provider = provider.name(), rate = %rate, "Fresh fiat rate");
                    Self::store_fresh(cache, history, config, provider.name(), pair, rate).await;
                    return Ok(rate);
                }
                Ok(rate) => {
                    warn!(
                        provider = provider.name(),
                        rate = %rate,
                        "Discarding non-positive fiat quote"
                    );
                }
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        error = %e,
                        "Fiat provider failed, trying next"
                    );
                }
            }
        }

        Err(RateError::NoRateAvailable(pair.clone()))
    }

    /// Cache and persist a freshly fetched rate. Both writes are best
    /// effort.
    async fn store_fresh(
        cache: &Arc<dyn CacheStore>,
        history: &Arc<dyn RateHistoryStore>,
        config: &FiatResolverConfig,
        provider: &str,
        pair: &CurrencyPair,
        rate: Decimal,
    ) {
        match CacheEntry::new(rate).to_json() {
            Ok(value) => {
                if let Err(e) = cache
                    .set(&Self::cache_key(pair), value, config.stale_ceiling)
                    .await
                {
                    warn!(pair = %pair, error = %e, "Failed to cache fiat rate");
                }
            }
            Err(e) => {
                warn!(pair = %pair, error = %e, "Failed to encode fiat cache entry");
            }
        }

        let snapshot = RateSnapshot::new(
            pair.clone(),
            rate,
            SnapshotMetadata::Direct {
                provider: provider.to_string(),
            },
        );
        if let Err(e) = history.save(&snapshot).await {
            warn!(pair = %pair, error = %e, "Failed to persist fiat rate snapshot");
        }
    }

    /// Last resort: serve the most recent persisted rate, marked stale.
    async fn historical_fallback(&self, pair: &CurrencyPair) -> RateResult<FiatRateQuote> {
        warn!(pair = %pair, "All fiat providers failed, trying rate history");

        match self.history.find_latest(pair).await {
            Ok(Some(snapshot)) => {
                self.metrics.fiat_fallback();
                warn!(
                    rate = %snapshot.rate,
                    snapshot_at = %snapshot.timestamp,
                    "Serving last persisted fiat rate"
                );

                match CacheEntry::new(snapshot.rate).to_json() {
                    Ok(value) => {
                        if let Err(e) = self
                            .cache
                            .set(&Self::cache_key(pair), value, self.config.stale_ceiling)
                            .await
                        {
                            warn!(pair = %pair, error = %e, "Failed to cache fallback fiat rate");
                        }
                    }
                    Err(e) => {
                        warn!(pair = %pair, error = %e, "Failed to encode fallback cache entry");
                    }
                }

                Ok(FiatRateQuote {
                    rate: snapshot.rate,
                    from_cache: false,
                    is_stale: true,
                })
            }
            Ok(None) => Err(RateError::NoRateAvailable(pair.clone())),
            Err(e) => {
                warn!(pair = %pair, error = %e, "Fiat rate history lookup failed");
                Err(RateError::NoRateAvailable(pair.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ratequorum_providers::mock::MockFiatRateProvider;
    use ratequorum_store::{MemoryCacheStore, MemoryRateHistoryStore};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    struct Harness {
        primary: Arc<MockFiatRateProvider>,
        secondary: Arc<MockFiatRateProvider>,
        cache: Arc<MemoryCacheStore>,
        history: Arc<MemoryRateHistoryStore>,
        metrics: Arc<EngineMetrics>,
        resolver: FiatRateResolver,
    }

    fn harness() -> Harness {
        let primary = Arc::new(MockFiatRateProvider::new("OpenExchangeRates"));
        let secondary = Arc::new(MockFiatRateProvider::new("CoinGecko"));
        let cache = Arc::new(MemoryCacheStore::new());
        let history = Arc::new(MemoryRateHistoryStore::new());
        let metrics = Arc::new(EngineMetrics::new());

        let providers: Vec<Arc<dyn FiatRateProvider>> = vec![primary.clone(), secondary.clone()];
        let resolver = FiatRateResolver::new(
            providers,
            cache.clone(),
            history.clone(),
            FiatResolverConfig::default(),
            metrics.clone(),
        );

        Harness {
            primary,
            secondary,
            cache,
            history,
            metrics,
            resolver,
        }
    }

    fn usd_ngn() -> CurrencyPair {
        CurrencyPair::new(Currency::usd(), Currency::ngn())
    }

    async fn seed_cache(h: &Harness, pair: &CurrencyPair, rate: Decimal, age_secs: i64) {
        let entry =
            CacheEntry::with_timestamp(rate, Utc::now() - chrono::Duration::seconds(age_secs));
        h.cache
            .set(
                &format!("fiat-rate:{pair}"),
                entry.to_json().unwrap(),
                Duration::from_secs(600),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn same_currency_resolves_without_any_io() {
        struct CountingCacheStore {
            inner: MemoryCacheStore,
            ops: AtomicU64,
        }

        #[async_trait::async_trait]
        impl CacheStore for CountingCacheStore {
            async fn get(&self, key: &str) -> RateResult<Option<String>> {
                self.ops.fetch_add(1, Ordering::Relaxed);
                self.inner.get(key).await
            }

            async fn set(&self, key: &str, value: String, ttl: Duration) -> RateResult<()> {
                self.ops.fetch_add(1, Ordering::Relaxed);
                self.inner.set(key, value, ttl).await
            }

            async fn del(&self, key: &str) -> RateResult<()> {
                self.ops.fetch_add(1, Ordering::Relaxed);
                self.inner.del(key).await
            }
        }

        let primary = Arc::new(MockFiatRateProvider::new("OpenExchangeRates"));
        let cache = Arc::new(CountingCacheStore {
            inner: MemoryCacheStore::new(),
            ops: AtomicU64::new(0),
        });
        let providers: Vec<Arc<dyn FiatRateProvider>> = vec![primary.clone()];
        let resolver = FiatRateResolver::new(
            providers,
            cache.clone(),
            Arc::new(MemoryRateHistoryStore::new()),
            FiatResolverConfig::default(),
            Arc::new(EngineMetrics::new()),
        );

        let quote = resolver
            .get_rate(&Currency::usd(), &Currency::usd())
            .await
            .unwrap();

        assert_eq!(quote, FiatRateQuote::fresh(Decimal::ONE, false));
        assert_eq!(primary.call_count(), 0);
        assert_eq!(cache.ops.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn unsupported_currency_is_rejected_before_io() {
        let h = harness();
        let err = h
            .resolver
            .get_rate(&Currency::from("JPY"), &Currency::usd())
            .await
            .unwrap_err();
        assert!(matches!(err, RateError::UnsupportedCurrency(_)));
        assert_eq!(h.primary.call_count(), 0);
    }

    #[tokio::test]
    async fn fresh_cache_hit_skips_the_providers() {
        let h = harness();
        seed_cache(&h, &usd_ngn(), dec!(1520), 30).await;

        let quote = h
            .resolver
            .get_rate(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap();

        assert_eq!(quote.rate, dec!(1520));
        assert!(quote.from_cache);
        assert!(!quote.is_stale);
        assert_eq!(h.primary.call_count(), 0);
        assert_eq!(h.metrics.snapshot().fiat_cache_hits, 1);
    }

    #[tokio::test]
    async fn stale_hit_serves_immediately_and_revalidates_once() {
        let h = harness();
        seed_cache(&h, &usd_ngn(), dec!(1500), 90).await;
        h.primary
            .set_rate(&Currency::usd(), &Currency::ngn(), dec!(1540));
        h.primary.set_delay(Duration::from_millis(50));

        let first = h
            .resolver
            .get_rate(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap();
        let second = h
            .resolver
            .get_rate(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap();

        // Both reads got the old value without waiting.
        assert_eq!(first.rate, dec!(1500));
        assert!(first.is_stale);
        assert_eq!(second.rate, dec!(1500));
        assert!(second.is_stale);

        // One revalidation, despite two stale reads.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.primary.call_count(), 1);
        assert_eq!(h.metrics.snapshot().revalidations, 1);

        // The revalidated value is now fresh.
        let third = h
            .resolver
            .get_rate(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap();
        assert_eq!(third, FiatRateQuote::fresh(dec!(1540), true));
        assert_eq!(h.primary.call_count(), 1);
    }

    #[tokio::test]
    async fn failed_revalidation_releases_the_guard() {
        let h = harness();
        seed_cache(&h, &usd_ngn(), dec!(1500), 90).await;
        // No provider quotes: revalidation fails in the background.

        h.resolver
            .get_rate(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        h.resolver
            .get_rate(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(h.metrics.snapshot().revalidations, 2);
    }

    #[tokio::test]
    async fn expired_entry_forces_a_synchronous_fetch() {
        let h = harness();
        seed_cache(&h, &usd_ngn(), dec!(1400), 400).await;
        h.primary
            .set_rate(&Currency::usd(), &Currency::ngn(), dec!(1540));

        let quote = h
            .resolver
            .get_rate(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap();

        assert_eq!(quote, FiatRateQuote::fresh(dec!(1540), false));
        assert_eq!(h.primary.call_count(), 1);
    }

    #[tokio::test]
    async fn chain_falls_through_to_the_next_provider() {
        let h = harness();
        h.secondary
            .set_rate(&Currency::usd(), &Currency::ngn(), dec!(1525));

        let quote = h
            .resolver
            .get_rate(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap();

        assert_eq!(quote, FiatRateQuote::fresh(dec!(1525), false));
        assert_eq!(h.primary.call_count(), 1);
        assert_eq!(h.secondary.call_count(), 1);

        let snapshot = h.history.find_latest(&usd_ngn()).await.unwrap().unwrap();
        match snapshot.metadata {
            SnapshotMetadata::Direct { provider } => assert_eq!(provider, "CoinGecko"),
            other => panic!("expected direct metadata, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_provider_wins_without_calling_the_rest() {
        let h = harness();
        h.primary
            .set_rate(&Currency::usd(), &Currency::ngn(), dec!(1520));
        h.secondary
            .set_rate(&Currency::usd(), &Currency::ngn(), dec!(9999));

        let quote = h
            .resolver
            .get_rate(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap();

        assert_eq!(quote.rate, dec!(1520));
        assert_eq!(h.secondary.call_count(), 0);
    }

    #[tokio::test]
    async fn non_positive_quote_falls_through_the_chain() {
        let h = harness();
        h.primary
            .set_rate(&Currency::usd(), &Currency::ngn(), dec!(0));
        h.secondary
            .set_rate(&Currency::usd(), &Currency::ngn(), dec!(1525));

        let quote = h
            .resolver
            .get_rate(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap();
        assert_eq!(quote.rate, dec!(1525));
    }

    #[tokio::test]
    async fn total_outage_serves_history_marked_stale() {
        let h = harness();
        h.history
            .save(&RateSnapshot::new(
                usd_ngn(),
                dec!(1510),
                SnapshotMetadata::Direct {
                    provider: "OpenExchangeRates".to_string(),
                },
            ))
            .await
            .unwrap();

        let quote = h
            .resolver
            .get_rate(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap();

        assert_eq!(quote.rate, dec!(1510));
        assert!(!quote.from_cache);
        assert!(quote.is_stale);
        assert_eq!(h.metrics.snapshot().fiat_fallbacks, 1);

        // The fallback was cached; the next read skips the chain.
        let next = h
            .resolver
            .get_rate(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap();
        assert_eq!(next, FiatRateQuote::fresh(dec!(1510), true));
        assert_eq!(h.primary.call_count(), 1);
    }

    #[tokio::test]
    async fn total_outage_without_history_is_terminal() {
        let h = harness();
        let err = h
            .resolver
            .get_rate(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap_err();
        assert!(matches!(err, RateError::NoRateAvailable(_)));
    }

    #[tokio::test]
    async fn invalidation_forces_the_next_read_to_fetch() {
        let h = harness();
        seed_cache(&h, &usd_ngn(), dec!(1520), 10).await;
        h.primary
            .set_rate(&Currency::usd(), &Currency::ngn(), dec!(1530));

        let cached = h
            .resolver
            .get_rate(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap();
        assert!(cached.from_cache);
        assert_eq!(h.primary.call_count(), 0);

        h.resolver
            .invalidate_cache(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap();

        let refetched = h
            .resolver
            .get_rate(&Currency::usd(), &Currency::ngn())
            .await
            .unwrap();
        assert_eq!(refetched, FiatRateQuote::fresh(dec!(1530), false));
        assert_eq!(h.primary.call_count(), 1);
    }

    #[tokio::test]
    async fn supported_currencies_lists_the_allow_list() {
        let h = harness();
        let supported = h.resolver.supported_currencies();
        assert_eq!(supported.len(), 6);
        assert!(supported.contains(&Currency::kes()));
    }
}
