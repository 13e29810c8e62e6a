//! Binance ticker price provider.

use async_trait::async_trait;
use ratequorum_common::{CurrencyPair, RateError, RateResult};
use reqwest::Client;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::debug;

use crate::provider::RateProvider;

const PROVIDER_NAME: &str = "Binance";
const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the Binance spot ticker endpoint.
pub struct BinanceProvider {
    client: Client,
    base_url: String,
}

impl BinanceProvider {
    /// Create a provider against the production Binance API.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a provider against a custom endpoint.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Binance has no USD spot markets; USD-quoted pairs trade against USDT.
    fn symbol_for(pair: &CurrencyPair) -> String {
        let quote = match pair.quote.code() {
            "USD" => "USDT",
            other => other,
        };
        format!("{}{}", pair.base.code(), quote)
    }
}

impl Default for BinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateProvider for BinanceProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_rate(&self, pair: &CurrencyPair) -> RateResult<Decimal> {
        let symbol = Self::symbol_for(pair);
        let url = format!("{}/api/v3/ticker/price?symbol={}", self.base_url, symbol);

        let ticker: api::Ticker = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| RateError::provider(PROVIDER_NAME, e))?
            .error_for_status()
            .map_err(|e| RateError::provider(PROVIDER_NAME, e))?
            .json()
            .await
            .map_err(|e| RateError::provider(PROVIDER_NAME, e))?;

        debug!(pair = %pair, symbol = %symbol, rate = %ticker.price, "Binance quote");
        Ok(ticker.price)
    }
}

mod api {
    use rust_decimal::Decimal;
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Ticker {
        pub price: Decimal,
    }
}
