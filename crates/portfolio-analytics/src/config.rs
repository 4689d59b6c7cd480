use std::env;
use std::time::Duration;

/// Tunables for the analytics service.
#[derive(Debug, Clone)]
pub struct AnalyticsSettings {
    /// Annual risk-free rate as a fraction.
    pub risk_free_rate: f64,
    /// Market proxy used for beta and alpha and for the comparison chart.
    pub benchmark_symbol: String,
    /// Overall budget for one full report.
    pub deadline: Duration,
    pub correlation_window_days: i64,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.05,
            benchmark_symbol: "^GSPC".to_string(),
            deadline: Duration::from_secs(120),
            correlation_window_days: 365,
        }
    }
}

impl AnalyticsSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            risk_free_rate: env::var("RISK_FREE_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.risk_free_rate),
            benchmark_symbol: env::var("MARKET_BENCHMARK_SYMBOL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.benchmark_symbol),
            deadline: env::var("ANALYTICS_DEADLINE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.deadline),
            correlation_window_days: env::var("CORRELATION_WINDOW_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|d: &i64| *d > 0)
                .unwrap_or(defaults.correlation_window_days),
        }
    }
}
