//! In-memory collaborators for unit tests.

use analysis_core::{AnalysisError, Holding, PortfolioSource, Transaction, TransactionKind};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::pricing::PriceSource;

#[derive(Default)]
pub struct StaticPrices {
    pub closes: HashMap<String, BTreeMap<NaiveDate, f64>>,
    pub latest: HashMap<String, f64>,
    pub delay: Option<std::time::Duration>,
    pub history_calls: AtomicUsize,
}

impl StaticPrices {
    pub fn with_latest(mut self, symbol: &str, price: f64) -> Self {
        self.latest.insert(symbol.to_string(), price);
        self
    }

    pub fn with_closes(mut self, symbol: &str, closes: Vec<(NaiveDate, f64)>) -> Self {
        self.closes.insert(symbol.to_string(), closes.into_iter().collect());
        self
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl PriceSource for StaticPrices {
    async fn daily_closes(&self, symbol: &str, _lookback_days: i64) -> BTreeMap<NaiveDate, f64> {
        self.pause().await;
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.closes.get(symbol).cloned().unwrap_or_default()
    }

    async fn latest_price(&self, symbol: &str) -> Option<f64> {
        self.pause().await;
        self.latest.get(symbol).copied()
    }

    async fn latest_prices(&self, symbols: &[String]) -> HashMap<String, f64> {
        self.pause().await;
        symbols
            .iter()
            .filter_map(|s| self.latest.get(s).map(|p| (s.clone(), *p)))
            .collect()
    }
}

#[derive(Default)]
pub struct MemorySource {
    pub transactions: HashMap<i64, Vec<Transaction>>,
    pub holdings: HashMap<i64, Vec<Holding>>,
    pub fail: bool,
}

#[async_trait]
impl PortfolioSource for MemorySource {
    async fn list_transactions(&self, portfolio_id: i64) -> Result<Vec<Transaction>, AnalysisError> {
        if self.fail {
            return Err(AnalysisError::DatabaseError("unavailable".to_string()));
        }
        Ok(self.transactions.get(&portfolio_id).cloned().unwrap_or_default())
    }

    async fn list_holdings(&self, portfolio_id: i64) -> Result<Vec<Holding>, AnalysisError> {
        if self.fail {
            return Err(AnalysisError::DatabaseError("unavailable".to_string()));
        }
        Ok(self.holdings.get(&portfolio_id).cloned().unwrap_or_default())
    }
}

pub fn days_ago(n: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(n)
}

pub fn tx(symbol: &str, kind: TransactionKind, shares: f64, price: f64, at: DateTime<Utc>) -> Transaction {
    Transaction {
        id: None,
        symbol: symbol.to_string(),
        kind,
        shares,
        price,
        fees: 0.0,
        timestamp: at,
    }
}

pub fn holding(symbol: &str, shares: f64, sector: Option<&str>, current_price: f64) -> Holding {
    Holding {
        symbol: symbol.to_string(),
        shares,
        avg_cost: current_price,
        sector: sector.map(str::to_string),
        current_price,
    }
}
