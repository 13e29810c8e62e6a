//! Multi-provider consensus aggregation for crypto/fiat pairs.
//!
//! Every registered provider is queried concurrently with a per-call
//! deadline. Surviving quotes go through outlier rejection and a weighted
//! consensus; the result is cached, persisted as a snapshot, and the pair's
//! last-success time recorded for the staleness audit. When every provider
//! fails, the most recent snapshot is served instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ratequorum_common::{
    Currency, CurrencyPair, ProviderQuote, RateError, RateResult, RateSnapshot, SnapshotMetadata,
};
use ratequorum_providers::RateProvider;
use ratequorum_store::{CacheStore, RateHistoryStore};
use rust_decimal::Decimal;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::config::AggregatorConfig;
use crate::consensus;
use crate::metrics::EngineMetrics;

/// Weighted-consensus rate aggregator over concurrent providers.
pub struct RateAggregator {
    providers: Vec<Arc<dyn RateProvider>>,
    cache: Arc<dyn CacheStore>,
    history: Arc<dyn RateHistoryStore>,
    config: AggregatorConfig,
    last_success: DashMap<CurrencyPair, DateTime<Utc>>,
    metrics: Arc<EngineMetrics>,
}

impl RateAggregator {
    /// Create a new aggregator over the given providers and stores.
    pub fn new(
        providers: Vec<Arc<dyn RateProvider>>,
        cache: Arc<dyn CacheStore>,
        history: Arc<dyn RateHistoryStore>,
        config: AggregatorConfig,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            providers,
            cache,
            history,
            config,
            last_success: DashMap::new(),
            metrics,
        }
    }

    fn cache_key(pair: &CurrencyPair) -> String {
        format!("rate:{pair}")
    }

    /// Get the consensus rate for a pair, served from cache while the
    /// cached value is within TTL.
    #[instrument(skip(self), fields(pair = %pair))]
    pub async fn get_rate(&self, pair: &CurrencyPair) -> RateResult<Decimal> {
        let key = Self::cache_key(pair);
        match self.cache.get(&key).await {
            Ok(Some(value)) => match value.parse::<Decimal>() {
                Ok(rate) => {
                    self.metrics.cache_hit();
                    debug!(rate = %rate, "Serving cached consensus rate");
                    return Ok(rate);
                }
                Err(e) => {
                    warn!(error = %e, "Discarding undecodable cached rate");
                }
            },
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Cache read failed, treating as miss");
            }
        }

        self.metrics.cache_miss();
        self.fetch_and_aggregate(pair).await
    }

    /// Get the consensus rate between two currencies.
    pub async fn get_rate_for(&self, from: &Currency, to: &Currency) -> RateResult<Decimal> {
        let pair = CurrencyPair::new(from.clone(), to.clone());
        self.get_rate(&pair).await
    }

    /// Convert an amount using the current consensus rate.
    pub async fn convert_amount(
        &self,
        amount: Decimal,
        from: &Currency,
        to: &Currency,
    ) -> RateResult<Decimal> {
        let rate = self.get_rate_for(from, to).await?;
        Ok(amount * rate)
    }

    /// Rate from a fiat currency into USD.
    ///
    /// Callers creating payments tolerate a missing rate here, so failures
    /// come back as 1 with a warning instead of an error.
    pub async fn get_fiat_to_usd_rate(&self, currency: &Currency) -> Decimal {
        if currency == &Currency::usd() {
            return Decimal::ONE;
        }

        match self.get_rate_for(currency, &Currency::usd()).await {
            Ok(rate) => rate,
            Err(e) => {
                warn!(currency = %currency, error = %e, "No USD rate, defaulting to 1");
                Decimal::ONE
            }
        }
    }

    /// Snapshots persisted for a pair within a time range, oldest first.
    pub async fn get_historical_rates(
        &self,
        base: &Currency,
        quote: &Currency,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RateResult<Vec<RateSnapshot>> {
        let pair = CurrencyPair::new(base.clone(), quote.clone());
        self.history.find_in_range(&pair, from, to).await
    }

    /// Aggregate a fresh consensus rate from every registered provider,
    /// bypassing the cache.
    #[instrument(skip(self), fields(pair = %pair))]
    pub async fn fetch_and_aggregate(&self, pair: &CurrencyPair) -> RateResult<Decimal> {
        let (quotes, errors) = self.collect_quotes(pair).await;

        if quotes.is_empty() {
            return self.historical_fallback(pair, &errors).await;
        }

        let raw = quotes.clone();
        let (survivors, outliers) =
            consensus::filter_outliers(quotes, self.config.outlier_threshold);

        if !outliers.is_empty() {
            self.metrics.outliers_rejected_add(outliers.len() as u64);
            for outlier in &outliers {
                warn!(
                    provider = %outlier.provider,
                    rate = %outlier.rate,
                    "Rejected outlier quote"
                );
            }
        }

        let Some(rate) = consensus::weighted_consensus(&survivors, &self.config) else {
            self.metrics.aggregation_failed();
            error!("Outlier filtering rejected every quote");
            return Err(RateError::AggregationFailed(pair.clone()));
        };

        let spread = consensus::spread(&survivors);
        let confidence = consensus::confidence(survivors.len(), self.providers.len(), spread);

        let key = Self::cache_key(pair);
        if let Err(e) = self
            .cache
            .set(&key, rate.to_string(), self.config.cache_ttl)
            .await
        {
            warn!(error = %e, "Failed to cache consensus rate");
        }

        let snapshot = RateSnapshot::new(
            pair.clone(),
            rate,
            SnapshotMetadata::Consensus {
                raw,
                valid: survivors.clone(),
                errors,
                spread,
                confidence,
            },
        );
        if let Err(e) = self.history.save(&snapshot).await {
            warn!(error = %e, "Failed to persist rate snapshot");
        }

        self.last_success.insert(pair.clone(), Utc::now());
        self.metrics.aggregation_succeeded();

        info!(
            rate = %rate,
            spread = %spread,
            confidence = %confidence,
            survivors = survivors.len(),
            "Consensus rate resolved"
        );
        Ok(rate)
    }

    /// Query every provider concurrently, each under its own deadline.
    ///
    /// A timeout, a transport error, or a non-positive rate all count as
    /// that provider failing; the rest of the fan-out is unaffected.
    async fn collect_quotes(&self, pair: &CurrencyPair) -> (Vec<ProviderQuote>, Vec<String>) {
        let mut tasks = JoinSet::new();
        for provider in &self.providers {
            let provider = Arc::clone(provider);
            let pair = pair.clone();
            let deadline = self.config.provider_timeout;
            tasks.spawn(async move {
                let name = provider.name().to_string();
                let outcome = match tokio::time::timeout(deadline, provider.get_rate(&pair)).await
                {
                    Ok(Ok(rate)) if rate > Decimal::ZERO => Ok(rate),
                    Ok(Ok(rate)) => Err(format!("non-positive rate {rate}")),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("timed out after {}ms", deadline.as_millis())),
                };
                (name, outcome)
            });
        }

        let mut quotes = Vec::new();
        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((provider, Ok(rate))) => {
                    debug!(provider = %provider, rate = %rate, "Provider quote");
                    quotes.push(ProviderQuote::new(provider, rate));
                }
                Ok((provider, Err(message))) => {
                    warn!(provider = %provider, error = %message, "Provider failed");
                    errors.push(format!("{provider}: {message}"));
                }
                Err(e) => {
                    warn!(error = %e, "Provider task aborted");
                    errors.push(format!("task: {e}"));
                }
            }
        }

        self.metrics.provider_errors_add(errors.len() as u64);
        (quotes, errors)
    }

    /// Serve the most recent persisted snapshot when every provider failed.
    ///
    /// The served rate is not re-cached and does not count as a success
    /// for the staleness audit.
    async fn historical_fallback(
        &self,
        pair: &CurrencyPair,
        errors: &[String],
    ) -> RateResult<Decimal> {
        warn!(errors = ?errors, "All providers failed, trying rate history");

        match self.history.find_latest(pair).await {
            Ok(Some(snapshot)) => {
                self.metrics.historical_fallback();
                warn!(
                    rate = %snapshot.rate,
                    snapshot_at = %snapshot.timestamp,
                    "Serving last persisted rate"
                );
                Ok(snapshot.rate)
            }
            Ok(None) => {
                self.metrics.aggregation_failed();
                error!("No providers available and no rate history");
                Err(RateError::AggregationFailed(pair.clone()))
            }
            Err(e) => {
                self.metrics.aggregation_failed();
                error!(error = %e, "Rate history lookup failed");
                Err(RateError::AggregationFailed(pair.clone()))
            }
        }
    }

    /// Monitored pairs whose last successful aggregation is older than the
    /// configured threshold. Pairs that never succeeded count as stale.
    pub fn stale_pairs(&self) -> Vec<CurrencyPair> {
        self.config
            .monitored_pairs
            .iter()
            .filter(|pair| {
                match self.last_success.get(*pair) {
                    Some(entry) => {
                        let age = (Utc::now() - *entry.value()).to_std().unwrap_or_default();
                        age > self.config.stale_after
                    }
                    None => true,
                }
            })
            .cloned()
            .collect()
    }

    /// One staleness audit pass. Advisory only; never mutates rate state.
    pub fn audit_staleness(&self) {
        for pair in self.stale_pairs() {
            error!(pair = %pair, "Rate is STALE: no recent successful aggregation");
        }
    }

    /// One refresh pass over the monitored pairs.
    pub async fn refresh_monitored_pairs(&self) {
        for pair in &self.config.monitored_pairs {
            if let Err(e) = self.fetch_and_aggregate(pair).await {
                error!(pair = %pair, error = %e, "Scheduled refresh failed");
            }
        }
    }

    /// Refresh every monitored pair on a fixed cadence. Runs until the
    /// task is aborted.
    pub async fn run_refresh_loop(self: Arc<Self>) {
        info!(
            interval_secs = self.config.refresh_interval.as_secs(),
            "Rate refresh loop started"
        );
        loop {
            tokio::time::sleep(self.config.refresh_interval).await;
            self.refresh_monitored_pairs().await;
        }
    }

    /// Audit monitored pairs for staleness on a fixed cadence. Runs until
    /// the task is aborted.
    pub async fn run_staleness_audit_loop(self: Arc<Self>) {
        info!(
            interval_secs = self.config.audit_interval.as_secs(),
            "Staleness audit loop started"
        );
        loop {
            tokio::time::sleep(self.config.audit_interval).await;
            self.audit_staleness();
        }
    }

    /// Metrics handle shared with this aggregator.
    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }
}
