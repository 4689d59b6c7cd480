use analysis_core::BenchmarkPoint;
use chrono::NaiveDate;
use futures_util::future::join_all;
use std::collections::BTreeMap;

use crate::models::ValuationPoint;
use crate::pricing::{close_at_or_after, PriceSource};
use crate::shared_math::round_to;

/// Indices reported alongside every benchmark comparison.
pub const BENCHMARK_INDICES: [(&str, &str); 4] = [
    ("NIFTY50", "^NSEI"),
    ("SP500", "^GSPC"),
    ("NASDAQ", "^IXIC"),
    ("SENSEX", "^BSESN"),
];

pub struct BenchmarkComparer;

impl BenchmarkComparer {
    /// Portfolio series with a benchmark rescaled to the same starting value.
    ///
    /// Each observation uses the first benchmark close on or after its date,
    /// scaled by `close / base_close * initial_portfolio_value`, where the base
    /// close is the one matched to the first observation. A missing close
    /// repeats the previous benchmark value.
    pub fn compare(observations: &[ValuationPoint], benchmark: &BTreeMap<NaiveDate, f64>) -> Vec<BenchmarkPoint> {
        let Some(first) = observations.first() else {
            return Vec::new();
        };
        let initial_value = first.value;
        let base = close_at_or_after(benchmark, first.date).filter(|c| *c > 0.0);

        let mut previous = initial_value;
        observations
            .iter()
            .map(|obs| {
                let normalized = base
                    .and_then(|base| close_at_or_after(benchmark, obs.date).map(|close| close / base * initial_value))
                    .unwrap_or(previous);
                previous = normalized;

                BenchmarkPoint {
                    date: obs.date.format("%Y-%m-%d").to_string(),
                    portfolio_value: round_to(obs.value, 2),
                    benchmark_value: round_to(normalized, 2),
                }
            })
            .collect()
    }

    /// Total return in percent, 0.0 with fewer than two closes.
    pub fn total_return(closes: &BTreeMap<NaiveDate, f64>) -> f64 {
        let (Some(start), Some(end)) = (closes.values().next(), closes.values().next_back()) else {
            return 0.0;
        };
        if closes.len() < 2 || *start <= 0.0 {
            return 0.0;
        }
        round_to((end - start) / start * 100.0, 2)
    }

    /// Total return of each reference index over the trailing `days`.
    pub async fn index_returns(prices: &dyn PriceSource, days: i64) -> BTreeMap<String, f64> {
        let fetched = join_all(BENCHMARK_INDICES.iter().map(|(name, symbol)| async move {
            let closes = prices.daily_closes(symbol, days).await;
            if closes.len() < 2 {
                tracing::warn!("Not enough {} ({}) history for a {}d return", name, symbol, days);
            }
            (name.to_string(), Self::total_return(&closes))
        }))
        .await;

        fetched.into_iter().collect()
    }
}
