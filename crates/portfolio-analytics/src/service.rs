use analysis_core::{
    AnalyticsReport, BenchmarkComparison, CorrelationMatrix, Holding, PerformanceMetrics, PortfolioSource,
    SectorAllocation, Timeframe, Transaction,
};
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::allocation;
use crate::benchmark::BenchmarkComparer;
use crate::config::AnalyticsSettings;
use crate::correlation;
use crate::metrics::{MetricsCalculator, MIN_OBSERVATIONS};
use crate::models::{PortfolioHistory, ReturnPeriod};
use crate::pricing::{close_at_or_before, PriceSource};
use crate::return_series::ReturnSeriesBuilder;

/// Analytics facade. Every operation returns a usable value: collaborator
/// and provider failures degrade to the documented defaults.
#[derive(Clone)]
pub struct AnalyticsService {
    source: Arc<dyn PortfolioSource>,
    prices: Arc<dyn PriceSource>,
    metrics: MetricsCalculator,
    settings: AnalyticsSettings,
}

impl AnalyticsService {
    pub fn new(source: Arc<dyn PortfolioSource>, prices: Arc<dyn PriceSource>, settings: AnalyticsSettings) -> Self {
        Self {
            source,
            prices,
            metrics: MetricsCalculator::new(settings.risk_free_rate),
            settings,
        }
    }

    pub fn settings(&self) -> &AnalyticsSettings {
        &self.settings
    }

    async fn transactions(&self, portfolio_id: i64) -> Vec<Transaction> {
        match self.source.list_transactions(portfolio_id).await {
            Ok(txs) => txs,
            Err(e) => {
                tracing::error!("Failed to load transactions for portfolio {}: {}", portfolio_id, e);
                Vec::new()
            }
        }
    }

    async fn holdings(&self, portfolio_id: i64) -> Vec<Holding> {
        match self.source.list_holdings(portfolio_id).await {
            Ok(holdings) => holdings.into_iter().filter(|h| h.shares > 0.0).collect(),
            Err(e) => {
                tracing::error!("Failed to load holdings for portfolio {}: {}", portfolio_id, e);
                Vec::new()
            }
        }
    }

    async fn holding_prices(&self, holdings: &[Holding]) -> HashMap<String, f64> {
        if holdings.is_empty() {
            return HashMap::new();
        }
        let symbols: Vec<String> = holdings.iter().map(|h| h.symbol.clone()).collect();
        self.prices.latest_prices(&symbols).await
    }

    /// Replayed valuation history of the whole ledger.
    pub async fn portfolio_history(&self, portfolio_id: i64) -> PortfolioHistory {
        let txs = self.transactions(portfolio_id).await;
        ReturnSeriesBuilder::new(self.prices.as_ref()).build(&txs).await
    }

    pub async fn compute_performance_metrics(&self, portfolio_id: i64) -> PerformanceMetrics {
        let history = self.portfolio_history(portfolio_id).await;
        let periods = history.dated_returns();

        if periods.len() < MIN_OBSERVATIONS {
            tracing::debug!(
                "Portfolio {} has {} return observations, using default metrics",
                portfolio_id,
                periods.len()
            );
            return PerformanceMetrics::default();
        }

        let returns: Vec<f64> = periods.iter().map(|p| p.value).collect();
        let market = self.market_returns(&periods).await;
        let metrics = self.metrics.compute(&returns, market.as_deref());

        tracing::info!(
            "Portfolio {} metrics: sharpe={} vol={}% beta={} ({} observations)",
            portfolio_id,
            metrics.sharpe_ratio,
            metrics.volatility,
            metrics.beta,
            returns.len()
        );
        metrics
    }

    /// Benchmark returns over the same periods as the portfolio. `None` if
    /// any period cannot be priced.
    async fn market_returns(&self, periods: &[ReturnPeriod]) -> Option<Vec<f64>> {
        let first = periods.first()?.start;
        let days = (Utc::now().date_naive() - first).num_days().max(1) + 7;
        let symbol = &self.settings.benchmark_symbol;

        let closes = self.prices.daily_closes(symbol, days).await;
        if closes.is_empty() {
            tracing::warn!("No {} history, beta and alpha use defaults", symbol);
            return None;
        }

        let mut market = Vec::with_capacity(periods.len());
        for p in periods {
            let start = close_at_or_before(&closes, p.start).filter(|c| *c > 0.0);
            let end = close_at_or_before(&closes, p.end);
            match (start, end) {
                (Some(s), Some(e)) => market.push((e - s) / s),
                _ => {
                    tracing::debug!("{} has no close for period starting {}", symbol, p.start);
                    return None;
                }
            }
        }
        Some(market)
    }

    pub async fn compute_sector_allocation(&self, portfolio_id: i64) -> Vec<SectorAllocation> {
        let holdings = self.holdings(portfolio_id).await;
        let prices = self.holding_prices(&holdings).await;
        allocation::sector_allocation(&holdings, &prices)
    }

    pub async fn compute_correlation_matrix(&self, portfolio_id: i64) -> Option<CorrelationMatrix> {
        let holdings = self.holdings(portfolio_id).await;
        let symbols: Vec<String> = holdings.iter().map(|h| h.symbol.clone()).collect();
        correlation::compute_correlation_matrix(self.prices.as_ref(), &symbols, self.settings.correlation_window_days)
            .await
    }

    pub async fn compute_diversification_score(&self, portfolio_id: i64) -> f64 {
        let holdings = self.holdings(portfolio_id).await;
        let prices = self.holding_prices(&holdings).await;
        allocation::diversification_score(&holdings, &prices)
    }

    /// Portfolio vs market series over `timeframe`, plus reference index returns.
    /// Only transactions inside the window are replayed.
    pub async fn compare_to_benchmark(&self, portfolio_id: i64, timeframe: Timeframe) -> BenchmarkComparison {
        let days = timeframe.days();
        let cutoff = Utc::now() - ChronoDuration::days(days);

        let txs: Vec<Transaction> = self
            .transactions(portfolio_id)
            .await
            .into_iter()
            .filter(|t| t.timestamp >= cutoff)
            .collect();

        let builder = ReturnSeriesBuilder::new(self.prices.as_ref());
        let (history, benchmark, index_returns) = tokio::join!(
            builder.build(&txs),
            self.prices.daily_closes(&self.settings.benchmark_symbol, days),
            BenchmarkComparer::index_returns(self.prices.as_ref(), days),
        );

        BenchmarkComparison {
            timeframe,
            portfolio_data: BenchmarkComparer::compare(&history.observations, &benchmark),
            benchmark_returns: index_returns,
        }
    }

    /// Everything at once, bounded by the configured deadline. On expiry the
    /// fallback report is returned.
    pub async fn compute_report(&self, portfolio_id: i64) -> AnalyticsReport {
        match tokio::time::timeout(self.settings.deadline, self.build_report(portfolio_id)).await {
            Ok(report) => report,
            Err(_) => {
                tracing::error!(
                    "Analytics for portfolio {} exceeded {}s, returning defaults",
                    portfolio_id,
                    self.settings.deadline.as_secs()
                );
                AnalyticsReport::fallback(portfolio_id)
            }
        }
    }

    async fn build_report(&self, portfolio_id: i64) -> AnalyticsReport {
        tracing::info!("Calculating analytics for portfolio {}", portfolio_id);

        let holdings = self.holdings(portfolio_id).await;
        let symbols: Vec<String> = holdings.iter().map(|h| h.symbol.clone()).collect();

        let (performance_metrics, prices, correlation_matrix) = tokio::join!(
            self.compute_performance_metrics(portfolio_id),
            self.holding_prices(&holdings),
            correlation::compute_correlation_matrix(
                self.prices.as_ref(),
                &symbols,
                self.settings.correlation_window_days
            ),
        );

        AnalyticsReport {
            portfolio_id,
            performance_metrics,
            sector_allocation: allocation::sector_allocation(&holdings, &prices),
            correlation_matrix,
            diversification_score: allocation::diversification_score(&holdings, &prices),
            last_updated: Utc::now(),
        }
    }
}
