use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::shared_math;

/// Open position rebuilt while replaying a ledger. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub shares: f64,
    pub total_cost: f64,
}

impl Position {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            shares: 0.0,
            total_cost: 0.0,
        }
    }

    pub fn avg_cost(&self) -> f64 {
        if self.shares > 0.0 {
            self.total_cost / self.shares
        } else {
            0.0
        }
    }
}

/// Mark-to-market value of the portfolio right after one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationPoint {
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub value: f64,
}

/// Result of replaying a transaction ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioHistory {
    pub observations: Vec<ValuationPoint>,
    /// Positions still open after the last transaction.
    pub positions: BTreeMap<String, Position>,
    pub dividend_income: f64,
    pub fees_paid: f64,
}

impl PortfolioHistory {
    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    pub fn returns(&self) -> Vec<f64> {
        shared_math::period_returns(&self.values())
    }

    /// Period returns tagged with the date of the observation that closes
    /// each period, plus the date that opens it.
    pub fn dated_returns(&self) -> Vec<ReturnPeriod> {
        self.observations
            .windows(2)
            .filter_map(|w| {
                if w[0].value > 0.0 {
                    Some(ReturnPeriod {
                        start: w[0].date,
                        end: w[1].date,
                        value: (w[1].value - w[0].value) / w[0].value,
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub value: f64,
}
