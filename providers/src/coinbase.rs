//! Coinbase spot rate provider.

use async_trait::async_trait;
use ratequorum_common::{CurrencyPair, RateError, RateResult};
use reqwest::Client;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::debug;

use crate::provider::RateProvider;

const PROVIDER_NAME: &str = "Coinbase";
const DEFAULT_BASE_URL: &str = "https://api.coinbase.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the Coinbase exchange-rates endpoint.
///
/// One request returns every rate quoted against the base asset; the
/// pair's quote currency is picked out of that table.
pub struct CoinbaseProvider {
    client: Client,
    base_url: String,
}

impl CoinbaseProvider {
    /// Create a provider against the production Coinbase API.
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

impl Default for CoinbaseProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateProvider for CoinbaseProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_rate(&self, pair: &CurrencyPair) -> RateResult<Decimal> {
        let url = format!(
            "{}/v2/exchange-rates?currency={}",
            self.base_url,
            pair.base.code()
        );

        let response: api::Response = self
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

        let rate = response
            .data
            .rates
            .get(pair.quote.code())
            .copied()
            .ok_or_else(|| {
                RateError::provider(
                    PROVIDER_NAME,
                    format!("no {} rate in response", pair.quote),
                )
            })?;

        debug!(pair = %pair, rate = %rate, "Coinbase quote");
        Ok(rate)
    }
}

mod api {
    use rust_decimal::Decimal;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Deserialize, Debug)]
    pub struct Response {
        pub data: Data,
    }

    #[derive(Deserialize, Debug)]
    pub struct Data {
        pub rates: HashMap<String, Decimal>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratequorum_common::Currency;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_picks_quote_currency_from_rate_table() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/exchange-rates"))
            .and(query_param("currency", "BTC"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "currency": "BTC",
                    "rates": { "USD": "50000.00", "EUR": "46200.50" }
                }
            })))
            .mount(&server)
            .await;

        let provider = CoinbaseProvider::with_base_url(server.uri());
        let pair = CurrencyPair::new(Currency::btc(), Currency::usd());

        let rate = provider.get_rate(&pair).await.unwrap();
        assert_eq!(rate, dec!(50000.00));
    }

    #[tokio::test]
    async fn test_missing_quote_currency_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/exchange-rates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "currency": "BTC", "rates": { "EUR": "46200.50" } }
            })))
            .mount(&server)
            .await;

        let provider = CoinbaseProvider::with_base_url(server.uri());
        let pair = CurrencyPair::new(Currency::btc(), Currency::usd());

        let result = provider.get_rate(&pair).await;
        assert!(matches!(result, Err(RateError::Provider { .. })));
    }

    #[tokio::test]
    async fn test_http_error_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = CoinbaseProvider::with_base_url(server.uri());
        let pair = CurrencyPair::new(Currency::btc(), Currency::usd());

        let result = provider.get_rate(&pair).await;
        assert!(matches!(result, Err(RateError::Provider { .. })));
    }
}
