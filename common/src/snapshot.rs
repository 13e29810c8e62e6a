//! Persisted rate snapshots.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::CurrencyPair;
use crate::time::{self, Timestamp};

/// A single provider's successful quote within one aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderQuote {
    /// Name of the provider that produced the quote.
    pub provider: String,
    /// The quoted rate.
    pub rate: Decimal,
}

impl ProviderQuote {
    /// Create a new quote.
    pub fn new(provider: impl Into<String>, rate: Decimal) -> Self {
        Self {
            provider: provider.into(),
            rate,
        }
    }
}

/// How a persisted rate was obtained.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnapshotMetadata {
    /// Weighted consensus over concurrent provider quotes.
    Consensus {
        /// Every successful quote, pre-filtering.
        raw: Vec<ProviderQuote>,
        /// Quotes that survived outlier rejection.
        valid: Vec<ProviderQuote>,
        /// Per-provider failure descriptions.
        errors: Vec<String>,
        /// Relative spread across surviving quotes, in percent.
        spread: Decimal,
        /// Agreement confidence in `[0, 1]`.
        confidence: Decimal,
    },
    /// A single provider won a sequential fallback chain.
    Direct {
        /// Name of the winning provider.
        provider: String,
    },
}

/// Durable, immutable record of one resolved rate.
///
/// Written on every successful aggregation or fiat fetch; read back for
/// history queries and as the last-resort fallback when every provider is
/// down. A snapshot is never persisted with a non-positive rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSnapshot {
    /// Unique snapshot ID.
    pub id: Uuid,
    /// The pair this rate resolves.
    pub pair: CurrencyPair,
    /// The resolved rate.
    pub rate: Decimal,
    /// How the rate was computed.
    pub metadata: SnapshotMetadata,
    /// When the rate was resolved.
    pub timestamp: Timestamp,
}

impl RateSnapshot {
    /// Create a new snapshot stamped with the current time.
    pub fn new(pair: CurrencyPair, rate: Decimal, metadata: SnapshotMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            pair,
            rate,
            metadata,
            timestamp: time::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_snapshot_creation() {
        let pair = CurrencyPair::new(Currency::btc(), Currency::usd());
        let s1 = RateSnapshot::new(
            pair.clone(),
            dec!(50000),
            SnapshotMetadata::Direct {
                provider: "Coinbase".to_string(),
            },
        );
        let s2 = RateSnapshot::new(
            pair,
            dec!(50000),
            SnapshotMetadata::Direct {
                provider: "Coinbase".to_string(),
            },
        );

        assert_ne!(s1.id, s2.id);
        assert!(s2.timestamp >= s1.timestamp);
    }

    #[test]
    fn test_consensus_metadata_json_shape() {
        let metadata = SnapshotMetadata::Consensus {
            raw: vec![
                ProviderQuote::new("Coinbase", dec!(100)),
                ProviderQuote::new("CoinGecko", dec!(150)),
            ],
            valid: vec![ProviderQuote::new("Coinbase", dec!(100))],
            errors: vec!["Binance: timed out".to_string()],
            spread: dec!(0),
            confidence: dec!(0.33),
        };

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["kind"], "consensus");
        assert_eq!(json["raw"][1]["provider"], "CoinGecko");
        assert_eq!(json["valid"].as_array().unwrap().len(), 1);
        assert_eq!(json["errors"][0], "Binance: timed out");
    }
}
