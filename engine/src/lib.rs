//! RateQuorum Engine
//!
//! Rate aggregation and resilience engine for payment flows.
//!
//! # Features
//!
//! - Weighted consensus over concurrent rate providers with outlier rejection
//! - Consensus caching with configurable TTL and snapshot persistence
//! - Stale-while-revalidate fiat rate resolution over a fallback chain
//! - Scheduled refresh and staleness auditing of monitored pairs
//!
//! # Example
//!
//! ```rust,ignore
//! use ratequorum_engine::{AggregatorConfig, EngineMetrics, RateAggregator};
//! use ratequorum_common::{Currency, CurrencyPair};
//!
//! let aggregator = RateAggregator::new(
//!     providers,
//!     cache,
//!     history,
//!     AggregatorConfig::default(),
//!     Arc::new(EngineMetrics::new()),
//! );
//!
//! // Get the current consensus rate
//! let pair = CurrencyPair::new(Currency::btc(), Currency::usd());
//! let rate = aggregator.get_rate(&pair).await?;
//! ```

pub mod aggregator;
pub mod config;
pub mod consensus;
pub mod metrics;
pub mod resolver;

pub use aggregator::RateAggregator;
pub use config::{AggregatorConfig, EngineConfig, FiatResolverConfig};
pub use metrics::{EngineMetrics, MetricsSnapshot, SharedEngineMetrics};
pub use resolver::{FiatRateQuote, FiatRateResolver};
