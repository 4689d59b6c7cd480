use async_trait::async_trait;
use chrono::NaiveDate;
use market_data::{MarketDataClient, Resolution};
use std::collections::{BTreeMap, HashMap};

/// Price lookups needed by the analytics. Implementations must not fail:
/// missing data is an empty map or `None`.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Daily closes over the trailing `lookback_days`.
    async fn daily_closes(&self, symbol: &str, lookback_days: i64) -> BTreeMap<NaiveDate, f64>;

    async fn latest_price(&self, symbol: &str) -> Option<f64>;

    async fn latest_prices(&self, symbols: &[String]) -> HashMap<String, f64>;
}

#[async_trait]
impl PriceSource for MarketDataClient {
    async fn daily_closes(&self, symbol: &str, lookback_days: i64) -> BTreeMap<NaiveDate, f64> {
        match self.historical_bars(symbol, Resolution::Day, lookback_days).await {
            Ok(bars) => bars.into_iter().map(|(date, bar)| (date, bar.close)).collect(),
            Err(e) => {
                tracing::warn!("No daily closes for {}: {}", symbol, e);
                BTreeMap::new()
            }
        }
    }

    async fn latest_price(&self, symbol: &str) -> Option<f64> {
        MarketDataClient::latest_price(self, symbol).await
    }

    async fn latest_prices(&self, symbols: &[String]) -> HashMap<String, f64> {
        MarketDataClient::latest_prices(self, symbols).await
    }
}

/// Close on `date`, or the nearest earlier close.
pub fn close_at_or_before(closes: &BTreeMap<NaiveDate, f64>, date: NaiveDate) -> Option<f64> {
    closes.range(..=date).next_back().map(|(_, c)| *c)
}

/// Close on `date`, or the nearest later close.
pub fn close_at_or_after(closes: &BTreeMap<NaiveDate, f64>, date: NaiveDate) -> Option<f64> {
    closes.range(date..).next().map(|(_, c)| *c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_close_lookups() {
        let closes: BTreeMap<NaiveDate, f64> =
            [(d("2024-01-02"), 10.0), (d("2024-01-05"), 12.0)].into_iter().collect();

        assert_eq!(close_at_or_before(&closes, d("2024-01-04")), Some(10.0));
        assert_eq!(close_at_or_before(&closes, d("2024-01-05")), Some(12.0));
        assert_eq!(close_at_or_before(&closes, d("2024-01-01")), None);

        assert_eq!(close_at_or_after(&closes, d("2024-01-03")), Some(12.0));
        assert_eq!(close_at_or_after(&closes, d("2024-01-06")), None);
    }
}
