//! Error taxonomy for rate resolution.

use thiserror::Error;

use crate::currency::{Currency, CurrencyPair};

/// Errors surfaced by the rate engine.
///
/// Provider-level failures are caught and isolated at the aggregation or
/// fallback-chain boundary; only the terminal "no source at all" conditions
/// reach callers.
#[derive(Debug, Error)]
pub enum RateError {
    /// One provider's fetch failed (network, decode, timeout, bad quote).
    #[error("Provider {provider} failed: {message}")]
    Provider { provider: String, message: String },

    /// Every provider failed and no historical snapshot exists.
    #[error("Rate aggregation failed for {0}")]
    AggregationFailed(CurrencyPair),

    /// Currency outside the configured allow-list.
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(Currency),

    /// Fallback chain and history store both exhausted.
    #[error("No rate available for {0}")]
    NoRateAvailable(CurrencyPair),

    /// Cache or history backend failure.
    #[error("Store error: {0}")]
    Store(String),

    /// A pair string that does not parse as `BASE-QUOTE`.
    #[error("Invalid currency pair: {0}")]
    InvalidPair(String),
}

impl RateError {
    /// Build a provider failure from any displayable cause.
    pub fn provider(name: impl Into<String>, cause: impl ToString) -> Self {
        Self::Provider {
            provider: name.into(),
            message: cause.to_string(),
        }
    }
}

/// Result type for rate engine operations.
pub type RateResult<T> = Result<T, RateError>;
