//! CoinGecko providers: simple-price quotes for crypto pairs and
//! BTC-denominated cross rates for fiat pairs.

use async_trait::async_trait;
use ratequorum_common::{Currency, CurrencyPair, RateError, RateResult};
use reqwest::Client;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::debug;

use crate::provider::{FiatRateProvider, RateProvider};

const PROVIDER_NAME: &str = "CoinGecko";
const DEFAULT_BASE_URL: &str = "https://api.coingecko.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// CoinGecko keys its price API by asset id, not ticker.
fn asset_id(currency: &Currency) -> Option<&'static str> {
    match currency.code() {
        "BTC" => Some("bitcoin"),
        "ETH" => Some("ethereum"),
        "SOL" => Some("solana"),
        _ => None,
    }
}

/// Client for the CoinGecko simple-price endpoint.
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoProvider {
    /// Create a provider against the production CoinGecko API.
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
}

impl Default for CoinGeckoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_rate(&self, pair: &CurrencyPair) -> RateResult<Decimal> {
        let id = asset_id(&pair.base).ok_or_else(|| {
            RateError::provider(PROVIDER_NAME, format!("no asset id for {}", pair.base))
        })?;
        let vs = pair.quote.code().to_lowercase();
        let url = format!(
            "{}/api/v3/simple/price?ids={}&vs_currencies={}",
            self.base_url, id, vs
        );

        let prices: api::SimplePrice = self
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

        let rate = prices
            .get(id)
            .and_then(|quotes| quotes.get(&vs))
            .copied()
            .ok_or_else(|| {
                RateError::provider(PROVIDER_NAME, format!("no {} price in response", pair))
            })?;

        debug!(pair = %pair, rate = %rate, "CoinGecko quote");
        Ok(rate)
    }
}

/// Client for the CoinGecko exchange-rates endpoint.
///
/// Every listed currency is quoted in BTC, so any fiat cross rate is the
/// ratio of the two BTC-denominated values.
pub struct CoinGeckoFiatProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoFiatProvider {
    /// Create a provider against the production CoinGecko API.
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
}

impl Default for CoinGeckoFiatProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FiatRateProvider for CoinGeckoFiatProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_rate(&self, from: &Currency, to: &Currency) -> RateResult<Decimal> {
        let url = format!("{}/api/v3/exchange_rates", self.base_url);

        let response: api::ExchangeRates = self
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

        let value_of = |currency: &Currency| {
            response
                .rates
                .get(&currency.code().to_lowercase())
                .map(|info| info.value)
                .ok_or_else(|| {
                    RateError::provider(PROVIDER_NAME, format!("{currency} not listed"))
                })
        };

        let from_value = value_of(from)?;
        let to_value = value_of(to)?;
        if from_value.is_zero() {
            return Err(RateError::provider(
                PROVIDER_NAME,
                format!("zero value for {from}"),
            ));
        }

        let rate = to_value / from_value;
        debug!(from = %from, to = %to, rate = %rate, "CoinGecko fiat cross rate");
        Ok(rate)
    }
}

mod api {
    use rust_decimal::Decimal;
    use serde::Deserialize;
    use std::collections::HashMap;

    /// `{"bitcoin": {"usd": 50000.0}}`
    pub type SimplePrice = HashMap<String, HashMap<String, Decimal>>;

    #[derive(Deserialize, Debug)]
    pub struct ExchangeRates {
        pub rates: HashMap<String, RateInfo>,
    }

    #[derive(Deserialize, Debug)]
    pub struct RateInfo {
        pub value: Decimal,
    }
}
