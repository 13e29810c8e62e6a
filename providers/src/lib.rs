//! RateQuorum Rate Providers
//!
//! Clients for the upstream price sources the engine aggregates over:
//!
//! - Coinbase, Binance and CoinGecko for crypto/fiat pairs
//! - CoinGecko and Open Exchange Rates for fiat/fiat pairs
//!
//! Every client maps any network, decode, or missing-field condition to a
//! provider error; the engine decides what a single failure means.

pub mod provider;
pub mod coinbase;
pub mod binance;
pub mod coingecko;
pub mod open_exchange_rates;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use provider::{FiatRateProvider, RateProvider};
pub use coinbase::CoinbaseProvider;
pub use binance::BinanceProvider;
pub use coingecko::{CoinGeckoFiatProvider, CoinGeckoProvider};
pub use open_exchange_rates::OpenExchangeRatesProvider;

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockFiatRateProvider, MockRateProvider};
