//! Scriptable in-memory providers for tests.

use async_trait::async_trait;
use dashmap::DashMap;
use ratequorum_common::{Currency, CurrencyPair, RateError, RateResult};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::provider::{FiatRateProvider, RateProvider};

/// Mock crypto rate provider.
///
/// A pair with no configured quote fails, which is how tests script a
/// provider outage. An optional per-call delay exercises timeout and
/// in-flight paths.
pub struct MockRateProvider {
    name: String,
    rates: DashMap<String, Decimal>,
    delay_ms: AtomicU64,
    calls: AtomicU64,
}

impl MockRateProvider {
    /// Create a new mock provider.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rates: DashMap::new(),
            delay_ms: AtomicU64::new(0),
            calls: AtomicU64::new(0),
        }
    }

    /// Set the quote returned for a pair.
    pub fn set_rate(&self, pair: &CurrencyPair, rate: Decimal) {
        self.rates.insert(pair.to_string(), rate);
    }

    /// Remove the quote for a pair; subsequent calls fail.
    pub fn clear_rate(&self, pair: &CurrencyPair) {
        self.rates.remove(&pair.to_string());
    }

    /// Delay every call by the given duration.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of `get_rate` calls served so far.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RateProvider for MockRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_rate(&self, pair: &CurrencyPair) -> RateResult<Decimal> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let delay = self.delay_ms.load(Ordering::Relaxed);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        self.rates
            .get(&pair.to_string())
            .map(|rate| *rate)
            .ok_or_else(|| RateError::provider(self.name.clone(), format!("no quote for {pair}")))
    }
}

/// Mock fiat rate provider, scripted the same way per `(from, to)` leg.
pub struct MockFiatRateProvider {
    name: String,
    rates: DashMap<String, Decimal>,
    delay_ms: AtomicU64,
    calls: AtomicU64,
}

impl MockFiatRateProvider {
    /// Create a new mock provider.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rates: DashMap::new(),
            delay_ms: AtomicU64::new(0),
            calls: AtomicU64::new(0),
        }
    }

    fn key(from: &Currency, to: &Currency) -> String {
        format!("{from}-{to}")
    }

    /// Set the quote returned for a conversion leg.
    pub fn set_rate(&self, from: &Currency, to: &Currency, rate: Decimal) {
        self.rates.insert(Self::key(from, to), rate);
    }

    /// Remove the quote for a leg; subsequent calls fail.
    pub fn clear_rate(&self, from: &Currency, to: &Currency) {
        self.rates.remove(&Self::key(from, to));
    }

    /// Delay every call by the given duration.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of `get_rate` calls served so far.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FiatRateProvider for MockFiatRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_rate(&self, from: &Currency, to: &Currency) -> RateResult<Decimal> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let delay = self.delay_ms.load(Ordering::Relaxed);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        self.rates
            .get(&Self::key(from, to))
            .map(|rate| *rate)
            .ok_or_else(|| {
                RateError::provider(self.name.clone(), format!("no quote for {from}-{to}"))
            })
    }
}
