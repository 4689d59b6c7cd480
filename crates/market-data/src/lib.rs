//! Resilient market data access: a rate-limited, retrying provider client
//! with a circuit breaker and a persistent OHLCV cache fallback.

pub mod breaker;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod finnhub;
pub mod provider;
pub mod rate_limiter;
pub mod retry;

pub use breaker::CircuitBreaker;
pub use cache::OhlcvCache;
pub use client::MarketDataClient;
pub use config::MarketDataConfig;
pub use error::{MarketDataError, MarketDataResult, ProviderOutcome};
pub use finnhub::FinnhubProvider;
pub use provider::{QuoteProvider, Resolution};
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
