use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::AnalysisError;

/// Daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub adjusted_close: f64,
}

/// Symbol search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub region: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Buy,
    Sell,
    Dividend,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Buy => "BUY",
            TransactionKind::Sell => "SELL",
            TransactionKind::Dividend => "DIVIDEND",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TransactionKind::Buy),
            "SELL" => Ok(TransactionKind::Sell),
            "DIVIDEND" => Ok(TransactionKind::Dividend),
            other => Err(AnalysisError::InvalidData(format!(
                "unknown transaction type: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded ledger entry. Immutable once written by the portfolio service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Option<i64>,
    pub symbol: String,
    pub kind: TransactionKind,
    pub shares: f64,
    pub price: f64,
    #[serde(default)]
    pub fees: f64,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Gross amount (shares x price), excluding fees.
    pub fn amount(&self) -> f64 {
        self.shares * self.price
    }
}

/// Current holding as reported by the portfolio service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub shares: f64,
    pub avg_cost: f64,
    pub sector: Option<String>,
    /// Last price the portfolio service stored for this holding.
    #[serde(default)]
    pub current_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub alpha: f64,
    pub beta: f64,
    pub volatility: f64,
    pub max_drawdown: f64,
}

/// Neutral values returned whenever data is insufficient or unavailable.
impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            alpha: 0.0,
            beta: 1.0,
            volatility: 0.0,
            max_drawdown: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub symbols: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorAllocation {
    pub sector: String,
    pub value: f64,
    pub percentage: f64,
}

/// One charting point: portfolio value next to the rescaled index value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkPoint {
    pub date: String,
    pub portfolio_value: f64,
    pub benchmark_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub timeframe: Timeframe,
    pub portfolio_data: Vec<BenchmarkPoint>,
    /// Total return (%) per index name over the timeframe.
    pub benchmark_returns: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub portfolio_id: i64,
    pub performance_metrics: PerformanceMetrics,
    pub sector_allocation: Vec<SectorAllocation>,
    pub correlation_matrix: Option<CorrelationMatrix>,
    pub diversification_score: f64,
    pub last_updated: DateTime<Utc>,
}

impl AnalyticsReport {
    /// Report used when the computation cannot complete at all.
    pub fn fallback(portfolio_id: i64) -> Self {
        Self {
            portfolio_id,
            performance_metrics: PerformanceMetrics::default(),
            sector_allocation: Vec::new(),
            correlation_matrix: None,
            diversification_score: 0.0,
            last_updated: Utc::now(),
        }
    }
}

/// Lookback windows accepted by the benchmark comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "3Y")]
    ThreeYears,
    #[serde(rename = "MAX")]
    Max,
}

impl Timeframe {
    pub fn days(&self) -> i64 {
        match self {
            Timeframe::OneMonth => 30,
            Timeframe::SixMonths => 180,
            Timeframe::OneYear => 365,
            Timeframe::ThreeYears => 1095,
            Timeframe::Max => 3650,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMonth => "1M",
            Timeframe::SixMonths => "6M",
            Timeframe::OneYear => "1Y",
            Timeframe::ThreeYears => "3Y",
            Timeframe::Max => "MAX",
        }
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::OneYear
    }
}

impl FromStr for Timeframe {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1M" => Ok(Timeframe::OneMonth),
            "6M" => Ok(Timeframe::SixMonths),
            "1Y" => Ok(Timeframe::OneYear),
            "3Y" => Ok(Timeframe::ThreeYears),
            "MAX" => Ok(Timeframe::Max),
            other => Err(AnalysisError::InvalidData(format!(
                "timeframe must be one of 1M, 6M, 1Y, 3Y, MAX (got {})",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_kind_parsing() {
        assert_eq!("buy".parse::<TransactionKind>().unwrap(), TransactionKind::Buy);
        assert_eq!(" SELL ".parse::<TransactionKind>().unwrap(), TransactionKind::Sell);
        assert_eq!("Dividend".parse::<TransactionKind>().unwrap(), TransactionKind::Dividend);
        assert!("SPLIT".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn test_parse_failures_are_invalid_data() {
        let err = "SPLIT".parse::<TransactionKind>().unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidData(ref msg) if msg.contains("SPLIT")));
        let err = "5Y".parse::<Timeframe>().unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidData(_)));
    }

    #[test]
    fn test_default_metrics_are_neutral() {
        let m = PerformanceMetrics::default();
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.sortino_ratio, 0.0);
        assert_eq!(m.alpha, 0.0);
        assert_eq!(m.beta, 1.0);
        assert_eq!(m.volatility, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
    }

    #[test]
    fn test_timeframe_days() {
        assert_eq!("1m".parse::<Timeframe>().unwrap().days(), 30);
        assert_eq!("MAX".parse::<Timeframe>().unwrap().days(), 3650);
        assert!("2W".parse::<Timeframe>().is_err());
        assert_eq!(Timeframe::default(), Timeframe::OneYear);
    }

    #[test]
    fn test_timeframe_serializes_as_label() {
        let json = serde_json::to_string(&Timeframe::SixMonths).unwrap();
        assert_eq!(json, "\"6M\"");
    }
}
