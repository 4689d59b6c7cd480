//! Portfolio analytics: ledger replay, risk/return metrics, allocation,
//! correlation and benchmark comparison over a resilient price source.

pub mod allocation;
pub mod benchmark;
pub mod config;
pub mod correlation;
pub mod metrics;
pub mod models;
pub mod pricing;
pub mod return_series;
pub mod service;
pub mod shared_math;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use benchmark::{BenchmarkComparer, BENCHMARK_INDICES};
pub use config::AnalyticsSettings;
pub use metrics::MetricsCalculator;
pub use models::{PortfolioHistory, Position, ValuationPoint};
pub use pricing::PriceSource;
pub use return_series::ReturnSeriesBuilder;
pub use service::AnalyticsService;
pub use store::SqlitePortfolioStore;
