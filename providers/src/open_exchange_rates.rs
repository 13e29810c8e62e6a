//! Open Exchange Rates fiat provider.

use async_trait::async_trait;
use ratequorum_common::{Currency, CurrencyPair, RateError, RateResult};
use reqwest::Client;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::debug;

use crate::provider::FiatRateProvider;

const PROVIDER_NAME: &str = "OpenExchangeRates";
const DEFAULT_BASE_URL: &str = "https://openexchangerates.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the Open Exchange Rates latest.json endpoint.
///
/// The free tier only serves USD-based tables, so non-USD conversions are
/// derived: `1/rates[from]` into USD, `rates[to]/rates[from]` across.
pub struct OpenExchangeRatesProvider {
    client: Client,
    base_url: String,
    app_id: String,
}

impl OpenExchangeRatesProvider {
    /// Create a provider against the production API.
    pub fn new(app_id: impl Into<String>) -> Self {
        Self::with_base_url(app_id, DEFAULT_BASE_URL)
    }

    /// Create a provider against a custom endpoint.
    pub fn with_base_url(app_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            app_id: app_id.into(),
        }
    }
}

#[async_trait]
impl FiatRateProvider for OpenExchangeRatesProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_rate(&self, from: &Currency, to: &Currency) -> RateResult<Decimal> {
        let url = format!(
            "{}/api/latest.json?app_id={}&base=USD&symbols={},{}",
            self.base_url,
            self.app_id,
            from.code(),
            to.code()
        );

        let response: api::Latest = self
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

        let usd_rate_for = |currency: &Currency| {
            response
                .rates
                .get(currency.code())
                .copied()
                .filter(|rate| !rate.is_zero())
                .ok_or_else(|| {
                    RateError::provider(PROVIDER_NAME, format!("no usable {currency} rate"))
                })
        };

        let rate = if from == &Currency::usd() {
            usd_rate_for(to)?
        } else if to == &Currency::usd() {
            Decimal::ONE / usd_rate_for(from)?
        } else {
            usd_rate_for(to)? / usd_rate_for(from)?
        };

        debug!(
            pair = %CurrencyPair::new(from.clone(), to.clone()),
            rate = %rate,
            "Open Exchange Rates quote"
        );
        Ok(rate)
    }
}

mod api {
    use rust_decimal::Decimal;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Deserialize, Debug)]
    pub struct Latest {
        pub rates: HashMap<String, Decimal>,
    }
}
