//! Rate provider contracts.

use async_trait::async_trait;
use ratequorum_common::{Currency, CurrencyPair, RateResult};
use rust_decimal::Decimal;

/// A source of crypto/fiat rate quotes.
///
/// Implementations fail with a provider error on any network, decode, or
/// missing-field condition. The aggregator treats each failure as one
/// branch's outcome; it never propagates past the aggregation boundary.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the current rate for a pair.
    async fn get_rate(&self, pair: &CurrencyPair) -> RateResult<Decimal>;
}

/// A source of fiat/fiat rate quotes.
///
/// The fiat resolver tries these in configured order; the first success
/// short-circuits the chain.
#[async_trait]
pub trait FiatRateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the current rate from one fiat currency to another.
    async fn get_rate(&self, from: &Currency, to: &Currency) -> RateResult<Decimal>;
}
