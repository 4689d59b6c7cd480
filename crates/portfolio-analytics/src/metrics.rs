use analysis_core::PerformanceMetrics;
use statrs::statistics::Statistics;

use crate::shared_math::{self, round_to, TRADING_DAYS};

/// Observations required before anything but the default object is produced.
pub const MIN_OBSERVATIONS: usize = 30;

/// Sortino reported when no period fell below the daily risk-free rate.
pub const NO_DOWNSIDE_SORTINO: f64 = 100.0;

/// Risk/return statistics over a period return series.
#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    pub risk_free_rate: f64,
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self { risk_free_rate: 0.05 }
    }
}

impl MetricsCalculator {
    pub fn new(risk_free_rate: f64) -> Self {
        Self { risk_free_rate }
    }

    fn daily_risk_free(&self) -> f64 {
        self.risk_free_rate / TRADING_DAYS
    }

    /// Full metrics object. `market_returns` must be aligned one-to-one with
    /// `returns`; pass `None` when the benchmark is unavailable.
    pub fn compute(&self, returns: &[f64], market_returns: Option<&[f64]>) -> PerformanceMetrics {
        if returns.len() < MIN_OBSERVATIONS {
            return PerformanceMetrics::default();
        }

        let beta = market_returns
            .map(|m| self.beta(returns, m))
            .unwrap_or(1.0);
        let alpha = market_returns
            .map(|m| self.alpha(returns, m))
            .unwrap_or(0.0);

        PerformanceMetrics {
            sharpe_ratio: round_to(self.sharpe(returns), 3),
            sortino_ratio: round_to(self.sortino(returns), 3),
            alpha: round_to(alpha, 3),
            beta: round_to(beta, 3),
            volatility: round_to(self.volatility(returns), 2),
            max_drawdown: round_to(shared_math::max_drawdown_from_returns(returns) * 100.0, 2),
        }
    }

    /// Annualized sample volatility, in percent.
    pub fn volatility(&self, returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        shared_math::sample_std(returns) * TRADING_DAYS.sqrt() * 100.0
    }

    pub fn sharpe(&self, returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        let annual_return = shared_math::mean(returns) * TRADING_DAYS;
        let annual_vol = shared_math::sample_std(returns) * TRADING_DAYS.sqrt();
        if annual_vol == 0.0 {
            return 0.0;
        }
        (annual_return - self.risk_free_rate) / annual_vol
    }

    pub fn sortino(&self, returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        let rf_daily = self.daily_risk_free();
        let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < rf_daily).collect();
        if downside.is_empty() {
            return NO_DOWNSIDE_SORTINO;
        }

        // Root mean square shortfall below the daily risk-free rate
        let downside_dev = downside.iter().map(|r| r - rf_daily).quadratic_mean() * TRADING_DAYS.sqrt();
        if downside_dev == 0.0 {
            return 0.0;
        }

        let annual_return = shared_math::mean(returns) * TRADING_DAYS;
        (annual_return - self.risk_free_rate) / downside_dev
    }

    /// Cov(returns, market) / Var(market); 1.0 on mismatched input.
    pub fn beta(&self, returns: &[f64], market_returns: &[f64]) -> f64 {
        if returns.is_empty() || returns.len() != market_returns.len() {
            return 1.0;
        }
        let market_var = shared_math::sample_variance(market_returns);
        if market_var == 0.0 {
            return 1.0;
        }
        shared_math::sample_covariance(returns, market_returns) / market_var
    }

    /// Jensen's alpha, annualized, in percent. Uses beta as reported
    /// (rounded to 3 decimals).
    pub fn alpha(&self, returns: &[f64], market_returns: &[f64]) -> f64 {
        if returns.is_empty() || returns.len() != market_returns.len() {
            return 0.0;
        }
        let rf_daily = self.daily_risk_free();
        let beta = round_to(self.beta(returns, market_returns), 3);
        let expected = rf_daily + beta * (shared_math::mean(market_returns) - rf_daily);
        (shared_math::mean(returns) - expected) * TRADING_DAYS * 100.0
    }
}
