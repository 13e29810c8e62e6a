//! Currency and currency-pair types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RateError;

/// A currency or crypto-asset code (ISO 4217 for fiat, ticker for crypto).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Common currencies
    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn gbp() -> Self {
        Self::new("GBP")
    }

    pub fn ngn() -> Self {
        Self::new("NGN")
    }

    pub fn kes() -> Self {
        Self::new("KES")
    }

    pub fn ghs() -> Self {
        Self::new("GHS")
    }

    /// Common crypto assets
    pub fn btc() -> Self {
        Self::new("BTC")
    }

    pub fn eth() -> Self {
        Self::new("ETH")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A rate pair, rendered as `BASE-QUOTE` (e.g. `BTC-USD`).
///
/// The hyphenated form is the canonical representation everywhere a pair
/// leaves the process: cache keys, persisted snapshots, log fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CurrencyPair {
    /// Base currency (the asset being priced).
    pub base: Currency,
    /// Quote currency (the pricing currency).
    pub quote: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    /// Get the inverse pair.
    pub fn inverse(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

impl FromStr for CurrencyPair {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() && !quote.contains('-') => {
                Ok(Self::new(Currency::new(base), Currency::new(quote)))
            }
            _ => Err(RateError::InvalidPair(s.to_string())),
        }
    }
}

impl Serialize for CurrencyPair {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CurrencyPair {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_uppercases() {
        assert_eq!(Currency::new("usd").code(), "USD");
        assert_eq!(Currency::new("Btc"), Currency::btc());
    }

    #[test]
    fn test_pair_display() {
        let pair = CurrencyPair::new(Currency::btc(), Currency::usd());
        assert_eq!(pair.to_string(), "BTC-USD");
    }

    #[test]
    fn test_pair_parse() {
        let pair: CurrencyPair = "eth-usd".parse().unwrap();
        assert_eq!(pair.base, Currency::eth());
        assert_eq!(pair.quote, Currency::usd());
    }

    #[test]
    fn test_pair_parse_rejects_malformed() {
        assert!("BTCUSD".parse::<CurrencyPair>().is_err());
        assert!("-USD".parse::<CurrencyPair>().is_err());
        assert!("BTC-".parse::<CurrencyPair>().is_err());
        assert!("BTC-USD-EUR".parse::<CurrencyPair>().is_err());
    }

    #[test]
    fn test_pair_inverse() {
        let pair = CurrencyPair::new(Currency::usd(), Currency::ngn());
        let inverse = pair.inverse();
        assert_eq!(inverse.base, Currency::ngn());
        assert_eq!(inverse.quote, Currency::usd());
    }

    #[test]
    fn test_pair_serde_round_trip() {
        let pair = CurrencyPair::new(Currency::btc(), Currency::usd());
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, "\"BTC-USD\"");

        let back: CurrencyPair = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pair);
    }
}
