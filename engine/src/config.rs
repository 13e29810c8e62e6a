//! Engine configuration.
//!
//! Both engines take explicit config objects at construction. Defaults
//! match production tuning; `EngineConfig::from_env` layers environment
//! overrides on top for the daemon.

use std::collections::HashMap;
use std::time::Duration;

use ratequorum_common::{Currency, CurrencyPair};
use rust_decimal::Decimal;

/// Configuration for the consensus rate aggregator.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Relative weight per provider name.
    pub provider_weights: HashMap<String, Decimal>,
    /// Weight assigned to providers absent from the weight table.
    pub default_weight: Decimal,
    /// Maximum relative deviation from the median before a quote is
    /// rejected as an outlier.
    pub outlier_threshold: Decimal,
    /// How long a consensus rate stays servable from cache.
    pub cache_ttl: Duration,
    /// Deadline for a single provider call.
    pub provider_timeout: Duration,
    /// Pairs refreshed proactively and audited for staleness.
    pub monitored_pairs: Vec<CurrencyPair>,
    /// Interval between scheduled refreshes of the monitored pairs.
    pub refresh_interval: Duration,
    /// Interval between staleness audits.
    pub audit_interval: Duration,
    /// Age of the last successful aggregation beyond which a monitored
    /// pair is reported stale.
    pub stale_after: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        let mut provider_weights = HashMap::new();
        provider_weights.insert("Coinbase".to_string(), Decimal::new(4, 1));
        provider_weights.insert("Binance".to_string(), Decimal::new(4, 1));
        provider_weights.insert("CoinGecko".to_string(), Decimal::new(2, 1));

        Self {
            provider_weights,
            default_weight: Decimal::new(1, 1),
            outlier_threshold: Decimal::new(5, 2),
            cache_ttl: Duration::from_secs(60),
            provider_timeout: Duration::from_secs(5),
            monitored_pairs: vec![
                CurrencyPair::new(Currency::btc(), Currency::usd()),
                CurrencyPair::new(Currency::eth(), Currency::usd()),
            ],
            refresh_interval: Duration::from_secs(60),
            audit_interval: Duration::from_secs(300),
            stale_after: Duration::from_secs(120),
        }
    }
}

impl AggregatorConfig {
    /// Weight used for a provider's quote in the consensus sum.
    pub fn weight_for(&self, provider: &str) -> Decimal {
        self.provider_weights
            .get(provider)
            .copied()
            .unwrap_or(self.default_weight)
    }
}

/// Configuration for the fiat rate resolver.
#[derive(Debug, Clone)]
pub struct FiatResolverConfig {
    /// Currencies the resolver accepts.
    pub supported_currencies: Vec<Currency>,
    /// Age below which a cached rate is served as fresh.
    pub fresh_ttl: Duration,
    /// Age at and beyond which a cached rate is too stale to serve.
    pub stale_ceiling: Duration,
}

impl Default for FiatResolverConfig {
    fn default() -> Self {
        Self {
            supported_currencies: vec![
                Currency::usd(),
                Currency::ngn(),
                Currency::eur(),
                Currency::gbp(),
                Currency::kes(),
                Currency::ghs(),
            ],
            fresh_ttl: Duration::from_secs(60),
            stale_ceiling: Duration::from_secs(300),
        }
    }
}

impl FiatResolverConfig {
    /// Whether a currency is on the allow-list.
    pub fn supports(&self, currency: &Currency) -> bool {
        self.supported_currencies.contains(currency)
    }
}

/// Top-level configuration for the rate daemon.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Consensus aggregator settings.
    pub aggregator: AggregatorConfig,
    /// Fiat resolver settings.
    pub fiat: FiatResolverConfig,
    /// Postgres URL for the rate history store. In-memory when unset.
    pub database_url: Option<String>,
    /// Open Exchange Rates app id. The provider is skipped when unset.
    pub open_exchange_rates_app_id: Option<String>,
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = Some(url);
        }

        if let Ok(app_id) = std::env::var("OPEN_EXCHANGE_RATES_APP_ID") {
            config.open_exchange_rates_app_id = Some(app_id);
        }

        if let Ok(pairs) = std::env::var("MONITORED_PAIRS") {
            let parsed: Vec<CurrencyPair> = pairs
                .split(',')
                .filter_map(|raw| raw.trim().parse().ok())
                .collect();
            if !parsed.is_empty() {
                config.aggregator.monitored_pairs = parsed;
            }
        }

        if let Ok(raw) = std::env::var("RATE_REFRESH_INTERVAL_SECS") {
            if let Ok(secs) = raw.parse() {
                config.aggregator.refresh_interval = Duration::from_secs(secs);
            }
        }

        if let Ok(raw) = std::env::var("RATE_CACHE_TTL_SECS") {
            if let Ok(secs) = raw.parse() {
                config.aggregator.cache_ttl = Duration::from_secs(secs);
            }
        }

        config
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.aggregator.outlier_threshold <= Decimal::ZERO {
            return Err("Outlier threshold must be positive".to_string());
        }

        if self.aggregator.default_weight <= Decimal::ZERO {
            return Err("Default provider weight must be positive".to_string());
        }

        if let Some((name, weight)) = self
            .aggregator
            .provider_weights
            .iter()
            .find(|(_, weight)| **weight <= Decimal::ZERO)
        {
            return Err(format!("Weight for provider {name} must be positive, got {weight}"));
        }

        if self.aggregator.provider_timeout.is_zero() {
            return Err("Provider timeout cannot be zero".to_string());
        }

        if self.aggregator.monitored_pairs.is_empty() {
            return Err("At least one monitored pair is required".to_string());
        }

        if self.fiat.fresh_ttl >= self.fiat.stale_ceiling {
            return Err("Fresh TTL must be below the stale ceiling".to_string());
        }

        if self.fiat.supported_currencies.is_empty() {
            return Err("Supported currency list cannot be empty".to_string());
        }

        Ok(())
    }
}
