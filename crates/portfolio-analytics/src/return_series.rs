use analysis_core::{Transaction, TransactionKind};
use chrono::{NaiveDate, Utc};
use futures_util::future::join_all;
use std::collections::{BTreeMap, HashMap};

use crate::models::{PortfolioHistory, Position, ValuationPoint};
use crate::pricing::{close_at_or_before, PriceSource};

/// Extra calendar days fetched before the first transaction so a
/// weekend or holiday start still finds an earlier close.
const LOOKBACK_PADDING_DAYS: i64 = 7;

/// Prices resolved once per replay.
///
/// Lookup order for a symbol on a date: the daily close on or before that
/// date, then the latest known price, then the symbol's last traded price.
#[derive(Debug, Default)]
pub struct PriceBook {
    closes: HashMap<String, BTreeMap<NaiveDate, f64>>,
    latest: HashMap<String, f64>,
}

impl PriceBook {
    pub fn new(closes: HashMap<String, BTreeMap<NaiveDate, f64>>, latest: HashMap<String, f64>) -> Self {
        Self { closes, latest }
    }

    pub fn price(&self, symbol: &str, date: NaiveDate, last_traded: Option<f64>) -> Option<f64> {
        self.closes
            .get(symbol)
            .and_then(|c| close_at_or_before(c, date))
            .or_else(|| self.latest.get(symbol).copied())
            .or(last_traded)
    }
}

/// Replays a transaction ledger into a valuation history.
pub struct ReturnSeriesBuilder<'a> {
    prices: &'a dyn PriceSource,
}

impl<'a> ReturnSeriesBuilder<'a> {
    pub fn new(prices: &'a dyn PriceSource) -> Self {
        Self { prices }
    }

    pub async fn build(&self, transactions: &[Transaction]) -> PortfolioHistory {
        let mut ledger = transactions.to_vec();
        ledger.sort_by_key(|t| t.timestamp);

        if ledger.is_empty() {
            return PortfolioHistory::default();
        }

        let book = self.price_book(&ledger).await;
        replay(&ledger, &book)
    }

    async fn price_book(&self, ledger: &[Transaction]) -> PriceBook {
        // First trade date per symbol; dividends don't need a market price
        let mut first_trade: BTreeMap<String, NaiveDate> = BTreeMap::new();
        for tx in ledger.iter().filter(|t| t.kind != TransactionKind::Dividend) {
            first_trade
                .entry(tx.symbol.clone())
                .or_insert_with(|| tx.timestamp.date_naive());
        }
        if first_trade.is_empty() {
            return PriceBook::default();
        }

        let start = ledger[0].timestamp.date_naive();
        let lookback = (Utc::now().date_naive() - start).num_days().max(1) + LOOKBACK_PADDING_DAYS;

        let fetched = join_all(first_trade.keys().map(|symbol| async move {
            let closes = self.prices.daily_closes(symbol, lookback).await;
            (symbol.clone(), closes)
        }))
        .await;
        let closes: HashMap<String, BTreeMap<NaiveDate, f64>> = fetched.into_iter().collect();

        // Symbols whose history doesn't reach back to their first trade
        let uncovered: Vec<String> = first_trade
            .iter()
            .filter(|(symbol, first)| {
                closes
                    .get(*symbol)
                    .and_then(|c| c.keys().next())
                    .map_or(true, |earliest| earliest > *first)
            })
            .map(|(symbol, _)| symbol.clone())
            .collect();

        let latest = if uncovered.is_empty() {
            HashMap::new()
        } else {
            tracing::debug!("Fetching latest prices for {} symbols without full history", uncovered.len());
            self.prices.latest_prices(&uncovered).await
        };

        PriceBook::new(closes, latest)
    }
}

/// Strictly sequential replay, one observation per transaction.
pub fn replay(ledger: &[Transaction], book: &PriceBook) -> PortfolioHistory {
    let mut history = PortfolioHistory::default();
    let mut positions: BTreeMap<String, Position> = BTreeMap::new();
    let mut last_traded: HashMap<String, f64> = HashMap::new();

    for tx in ledger {
        if !(tx.shares > 0.0) || !(tx.price > 0.0) {
            tracing::warn!(
                "Skipping {} {} with shares={} price={}",
                tx.kind,
                tx.symbol,
                tx.shares,
                tx.price
            );
            continue;
        }

        match tx.kind {
            TransactionKind::Buy => {
                let pos = positions
                    .entry(tx.symbol.clone())
                    .or_insert_with(|| Position::new(&tx.symbol));
                pos.shares += tx.shares;
                pos.total_cost += tx.amount();
                last_traded.insert(tx.symbol.clone(), tx.price);
            }
            TransactionKind::Sell => {
                last_traded.insert(tx.symbol.clone(), tx.price);
                match positions.get_mut(&tx.symbol) {
                    Some(pos) => {
                        let remaining = pos.shares - tx.shares;
                        if remaining <= 0.0 {
                            positions.remove(&tx.symbol);
                        } else {
                            pos.total_cost -= pos.total_cost * (tx.shares / pos.shares);
                            pos.shares = remaining;
                        }
                    }
                    None => tracing::warn!("SELL {} without an open position, ignored", tx.symbol),
                }
            }
            TransactionKind::Dividend => {
                history.dividend_income += tx.amount();
            }
        }
        history.fees_paid += tx.fees.max(0.0);

        let date = tx.timestamp.date_naive();
        let value: f64 = positions
            .values()
            .filter(|p| p.shares > 0.0)
            .map(|p| {
                let price = book
                    .price(&p.symbol, date, last_traded.get(&p.symbol).copied())
                    .unwrap_or(0.0);
                p.shares * price
            })
            .sum();

        history.observations.push(ValuationPoint {
            timestamp: tx.timestamp,
            date,
            value,
        });
    }

    history.positions = positions;
    history
}
