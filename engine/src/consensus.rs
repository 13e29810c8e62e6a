//! Consensus math over provider quotes.
//!
//! Pure functions, no I/O. The aggregator feeds these with the positive
//! quotes that survived the fan-out; callers must not pass zero or
//! negative rates.

use ratequorum_common::ProviderQuote;
use rust_decimal::Decimal;

use crate::config::AggregatorConfig;

/// Median of the quoted rates. Even-sized sets average the two middle
/// values.
pub fn median(quotes: &[ProviderQuote]) -> Option<Decimal> {
    if quotes.is_empty() {
        return None;
    }

    let mut rates: Vec<Decimal> = quotes.iter().map(|quote| quote.rate).collect();
    rates.sort();

    let mid = rates.len() / 2;
    if rates.len() % 2 == 0 {
        Some((rates[mid - 1] + rates[mid]) / Decimal::TWO)
    } else {
        Some(rates[mid])
    }
}

/// Split quotes into survivors and rejected outliers.
///
/// A quote is an outlier when its relative deviation from the median
/// exceeds `threshold`. Populations of two or fewer pass through
/// unfiltered; there is no basis to call either quote the outlier.
pub fn filter_outliers(
    quotes: Vec<ProviderQuote>,
    threshold: Decimal,
) -> (Vec<ProviderQuote>, Vec<ProviderQuote>) {
    if quotes.len() <= 2 {
        return (quotes, Vec::new());
    }

    let Some(median) = median(&quotes) else {
        return (quotes, Vec::new());
    };

    quotes
        .into_iter()
        .partition(|quote| ((quote.rate - median) / median).abs() <= threshold)
}

/// Weighted mean of the surviving quotes, re-normalized by the sum of
/// the surviving weights. `None` when no quotes survive.
pub fn weighted_consensus(quotes: &[ProviderQuote], config: &AggregatorConfig) -> Option<Decimal> {
    let mut weighted_sum = Decimal::ZERO;
    let mut total_weight = Decimal::ZERO;

    for quote in quotes {
        let weight = config.weight_for(&quote.provider);
        weighted_sum += quote.rate * weight;
        total_weight += weight;
    }

    if total_weight.is_zero() {
        return None;
    }

    Some(weighted_sum / total_weight)
}

/// Relative spread across the quotes, in percent of the minimum. Zero
/// for fewer than two quotes or a zero minimum.
pub fn spread(quotes: &[ProviderQuote]) -> Decimal {
    if quotes.len() < 2 {
        return Decimal::ZERO;
    }

    let mut min = quotes[0].rate;
    let mut max = quotes[0].rate;
    for quote in &quotes[1..] {
        min = min.min(quote.rate);
        max = max.max(quote.rate);
    }

    if min.is_zero() {
        return Decimal::ZERO;
    }

    (max - min) / min * Decimal::ONE_HUNDRED
}

/// Agreement confidence in `[0, 1]`: the survivor ratio, discounted when
/// the surviving quotes disagree.
///
/// A spread above 5% halves the score; a spread above 1% scales it by
/// 0.8.
pub fn confidence(survivors: usize, total: usize, spread_pct: Decimal) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }

    let base = Decimal::from(survivors as u64) / Decimal::from(total as u64);
    let scaled = if spread_pct > Decimal::from(5) {
        base * Decimal::new(5, 1)
    } else if spread_pct > Decimal::ONE {
        base * Decimal::new(8, 1)
    } else {
        base
    };

    scaled.clamp(Decimal::ZERO, Decimal::ONE)
}
