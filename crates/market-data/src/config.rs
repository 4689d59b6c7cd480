use std::env;
use std::time::Duration;

use crate::error::{MarketDataError, MarketDataResult};

pub const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";

/// Settings for the market data client and its provider.
#[derive(Debug, Clone)]
pub struct MarketDataConfig {
    pub api_key: String,
    pub base_url: String,
    /// Minimum spacing between any two provider requests (global, not per symbol).
    pub min_request_interval: Duration,
    /// Upper bound on in-flight provider calls.
    pub max_concurrency: usize,
    /// Total attempts per call, first try included.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub request_timeout: Duration,
}

impl MarketDataConfig {
    /// Read settings from the environment. A missing API key is fatal.
    pub fn from_env() -> MarketDataResult<Self> {
        let api_key = env::var("FINNHUB_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(MarketDataError::MissingCredentials)?;

        Ok(Self {
            api_key,
            base_url: env::var("FINNHUB_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            min_request_interval: Duration::from_millis(env_or("MARKET_DATA_MIN_INTERVAL_MS", 1000)),
            max_concurrency: env_or("MARKET_DATA_MAX_CONCURRENCY", 8u64).max(1) as usize,
            max_retries: env_or("MARKET_DATA_MAX_RETRIES", 3u64).max(1) as u32,
            backoff_base: Duration::from_millis(env_or("MARKET_DATA_BACKOFF_BASE_MS", 1000)),
            backoff_max: Duration::from_millis(env_or("MARKET_DATA_BACKOFF_MAX_MS", 30_000)),
            request_timeout: Duration::from_secs(env_or("MARKET_DATA_TIMEOUT_SECS", 10)),
        })
    }

    /// Defaults with an explicit key, for callers that manage credentials themselves.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            min_request_interval: Duration::from_secs(1),
            max_concurrency: 8,
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
        }
    }
}

fn env_or(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_api_key_defaults() {
        let cfg = MarketDataConfig::with_api_key("k");
        assert_eq!(cfg.api_key, "k");
        assert_eq!(cfg.max_concurrency, 8);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.min_request_interval, Duration::from_secs(1));
    }
}
