use analysis_core::{Holding, SectorAllocation};
use std::collections::HashMap;

use crate::shared_math::{herfindahl_index, round_to};

pub const UNCLASSIFIED_SECTOR: &str = "Other";

/// Market value of a holding, preferring a fetched price over the stored one.
pub fn market_value(holding: &Holding, prices: &HashMap<String, f64>) -> f64 {
    let price = prices
        .get(&holding.symbol)
        .copied()
        .unwrap_or(holding.current_price);
    holding.shares * price
}

/// Value grouped by sector, largest share first. Empty when nothing is held
/// or the book has no value.
pub fn sector_allocation(holdings: &[Holding], prices: &HashMap<String, f64>) -> Vec<SectorAllocation> {
    let mut by_sector: HashMap<String, f64> = HashMap::new();
    let mut total = 0.0;

    for h in holdings {
        let mv = market_value(h, prices);
        total += mv;
        let sector = h
            .sector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNCLASSIFIED_SECTOR);
        *by_sector.entry(sector.to_string()).or_insert(0.0) += mv;
    }

    if total <= 0.0 {
        return Vec::new();
    }

    let mut allocation: Vec<SectorAllocation> = by_sector
        .into_iter()
        .map(|(sector, value)| SectorAllocation {
            sector,
            value: round_to(value, 2),
            percentage: round_to(value / total * 100.0, 2),
        })
        .collect();

    allocation.sort_by(|a, b| {
        b.percentage
            .partial_cmp(&a.percentage)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.sector.cmp(&b.sector))
    });
    allocation
}

/// 1 minus the normalized Herfindahl index of market-value weights, in [0, 1].
///
/// No holdings or zero total value gives 0.0; a single holding gives 1.0.
pub fn diversification_score(holdings: &[Holding], prices: &HashMap<String, f64>) -> f64 {
    if holdings.is_empty() {
        return 0.0;
    }

    let values: Vec<f64> = holdings.iter().map(|h| market_value(h, prices)).collect();
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }

    let n = holdings.len() as f64;
    let min_hhi = 1.0 / n;
    let max_hhi = 1.0;
    if (max_hhi - min_hhi).abs() < f64::EPSILON {
        return 1.0;
    }

    let weights: Vec<f64> = values.iter().map(|v| v / total).collect();
    let normalized = (herfindahl_index(&weights) - min_hhi) / (max_hhi - min_hhi);
    round_to((1.0 - normalized).clamp(0.0, 1.0), 3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::holding;

    #[test]
    fn test_sector_allocation_groups_and_sorts() {
        let holdings = vec![
            holding("AAPL", 10.0, Some("Technology"), 100.0),
            holding("MSFT", 5.0, Some("Technology"), 200.0),
            holding("XOM", 10.0, Some("Energy"), 50.0),
            holding("BRK", 1.0, None, 500.0),
        ];
        let allocation = sector_allocation(&holdings, &HashMap::new());

        assert_eq!(allocation.len(), 3);
        assert_eq!(allocation[0].sector, "Technology");
        assert_eq!(allocation[0].value, 2000.0);
        assert_eq!(allocation[0].percentage, 66.67);
        assert_eq!(allocation[1].sector, "Energy");
        assert_eq!(allocation[2].sector, "Other");
        let sum: f64 = allocation.iter().map(|a| a.percentage).sum();
        assert!((sum - 100.0).abs() < 0.05);
    }

    #[test]
    fn test_fetched_price_overrides_stored_price() {
        let holdings = vec![holding("AAPL", 2.0, Some("Technology"), 100.0)];
        let mut prices = HashMap::new();
        prices.insert("AAPL".to_string(), 150.0);
        let allocation = sector_allocation(&holdings, &prices);
        assert_eq!(allocation[0].value, 300.0);
        assert_eq!(allocation[0].percentage, 100.0);
    }

    #[test]
    fn test_empty_or_worthless_book() {
        assert!(sector_allocation(&[], &HashMap::new()).is_empty());
        let worthless = vec![holding("DEAD", 10.0, None, 0.0)];
        assert!(sector_allocation(&worthless, &HashMap::new()).is_empty());
        assert_eq!(diversification_score(&worthless, &HashMap::new()), 0.0);
        assert_eq!(diversification_score(&[], &HashMap::new()), 0.0);
    }

    #[test]
    fn test_single_holding_scores_one() {
        let holdings = vec![holding("AAPL", 3.0, None, 10.0)];
        assert_eq!(diversification_score(&holdings, &HashMap::new()), 1.0);
    }

    #[test]
    fn test_equal_weights_maximize_score() {
        let equal: Vec<_> = ["A", "B", "C", "D"]
            .iter()
            .map(|s| holding(s, 1.0, None, 25.0))
            .collect();
        assert_eq!(diversification_score(&equal, &HashMap::new()), 1.0);

        let skewed = vec![
            holding("A", 1.0, None, 70.0),
            holding("B", 1.0, None, 10.0),
            holding("C", 1.0, None, 10.0),
            holding("D", 1.0, None, 10.0),
        ];
        let score = diversification_score(&skewed, &HashMap::new());
        assert!(score > 0.0 && score < 1.0);
    }
}
