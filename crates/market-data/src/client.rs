use analysis_core::{OhlcvBar, SymbolInfo};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use futures_util::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::breaker::CircuitBreaker;
use crate::cache::OhlcvCache;
use crate::config::MarketDataConfig;
use crate::error::{MarketDataError, MarketDataResult, ProviderOutcome};
use crate::finnhub::FinnhubProvider;
use crate::provider::{QuoteProvider, Resolution};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;

/// Resilient market data access.
///
/// Every provider call goes through the same path: circuit check, concurrency
/// permit, global pacing, the call itself, then retry on transient failures.
/// When retries run out the circuit opens and stays open until
/// [`reset_circuit`](Self::reset_circuit). While open, reads are served from
/// the local cache without touching the network.
#[derive(Clone)]
pub struct MarketDataClient {
    provider: Arc<dyn QuoteProvider>,
    cache: OhlcvCache,
    limiter: RateLimiter,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl MarketDataClient {
    pub fn new(provider: Arc<dyn QuoteProvider>, cache: OhlcvCache, config: &MarketDataConfig) -> Self {
        Self::with_parts(
            provider,
            cache,
            RateLimiter::new(config.min_request_interval),
            RetryPolicy::from_config(config),
            config.max_concurrency,
        )
    }

    pub fn with_parts(
        provider: Arc<dyn QuoteProvider>,
        cache: OhlcvCache,
        limiter: RateLimiter,
        retry: RetryPolicy,
        max_concurrency: usize,
    ) -> Self {
        Self {
            provider,
            cache,
            limiter,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            retry,
            breaker: CircuitBreaker::new(),
        }
    }

    /// Finnhub-backed client with its cache at `database_url`.
    pub async fn from_config(config: &MarketDataConfig, database_url: &str) -> MarketDataResult<Self> {
        let provider = FinnhubProvider::new(config)?;
        let cache = OhlcvCache::connect(database_url).await?;
        tracing::info!(
            "Market data client ready (provider={}, min_interval={}ms, max_concurrency={}, attempts={})",
            provider.name(),
            config.min_request_interval.as_millis(),
            config.max_concurrency,
            config.max_retries
        );
        Ok(Self::new(Arc::new(provider), cache, config))
    }

    pub fn cache(&self) -> &OhlcvCache {
        &self.cache
    }

    /// False once retries have been exhausted and until a manual reset.
    pub fn is_available(&self) -> bool {
        !self.breaker.is_open()
    }

    pub fn reset_circuit(&self) {
        self.breaker.reset();
    }

    async fn execute<T, F, Fut>(&self, op: &str, call: F) -> MarketDataResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ProviderOutcome<T>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| MarketDataError::Permanent("request pool closed".to_string()))?;

        let mut attempt: u32 = 0;
        loop {
            if self.breaker.is_open() {
                return Err(MarketDataError::CircuitOpen);
            }

            attempt += 1;
            self.limiter.acquire().await;

            match call().await {
                ProviderOutcome::Success(value) => {
                    if attempt > 1 {
                        tracing::debug!("{} succeeded on attempt {}", op, attempt);
                    }
                    return Ok(value);
                }
                ProviderOutcome::PermanentFailure(reason) => {
                    tracing::warn!("{} failed: {}", op, reason);
                    return Err(MarketDataError::Permanent(reason));
                }
                ProviderOutcome::TransientFailure(reason) => {
                    if !self.retry.has_attempts_left(attempt) {
                        tracing::error!(
                            "{} failed after {} attempts: {}",
                            op,
                            attempt,
                            reason
                        );
                        self.breaker.trip(&reason);
                        return Err(MarketDataError::Transient(reason));
                    }
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "{} attempt {}/{} failed ({}), retrying in {}ms",
                        op,
                        attempt,
                        self.retry.max_attempts,
                        reason,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Symbol lookup. Failures yield an empty list.
    pub async fn search_symbols(&self, query: &str) -> Vec<SymbolInfo> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        match self
            .execute(&format!("search '{}'", query), || self.provider.search(query))
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("Symbol search for '{}' unavailable: {}", query, e);
                Vec::new()
            }
        }
    }

    /// Latest price from the provider, else the most recent cached close.
    pub async fn latest_price(&self, symbol: &str) -> Option<f64> {
        match self
            .execute(&format!("quote {}", symbol), || self.provider.quote(symbol))
            .await
        {
            Ok(Some(price)) => return Some(price),
            Ok(None) => tracing::debug!("No live quote for {}, checking cache", symbol),
            Err(e) => tracing::warn!("Quote for {} unavailable ({}), using cache", symbol, e),
        }

        match self.cache.latest_price(symbol).await {
            Ok(price) => price,
            Err(e) => {
                tracing::error!("Cache lookup for {} failed: {}", symbol, e);
                None
            }
        }
    }

    /// Latest prices for many symbols. Symbols without any price are absent.
    ///
    /// Fetches run concurrently on the caller's task, bounded by the request
    /// permits. Dropping the future cancels every fetch still pending.
    pub async fn latest_prices(&self, symbols: &[String]) -> HashMap<String, f64> {
        let fetched = join_all(symbols.iter().map(|symbol| async move {
            (symbol, self.latest_price(symbol).await)
        }))
        .await;

        fetched
            .into_iter()
            .filter_map(|(symbol, price)| price.map(|p| (symbol.clone(), p)))
            .collect()
    }

    /// History for the last `lookback_days`, keyed by date (last bar of a day wins).
    ///
    /// Fresh daily bars are written through to the cache. If the provider
    /// cannot be used the cached range is returned instead, possibly empty.
    pub async fn historical_bars(
        &self,
        symbol: &str,
        resolution: Resolution,
        lookback_days: i64,
    ) -> MarketDataResult<BTreeMap<NaiveDate, OhlcvBar>> {
        let to = Utc::now();
        let from = to - ChronoDuration::days(lookback_days.max(1));

        let fetched = self
            .execute(&format!("candles {} {}", symbol, resolution), || {
                self.provider.candles(symbol, resolution, from, to)
            })
            .await;

        match fetched {
            Ok(bars) => {
                // Only daily bars share the cache's (symbol, date) key
                if resolution == Resolution::Day {
                    if let Err(e) = self.cache.upsert_bars(symbol, &bars).await {
                        tracing::warn!("Cache write for {} rolled back: {}", symbol, e);
                    }
                }
                Ok(bars.into_iter().map(|b| (b.date, b)).collect())
            }
            Err(e) => {
                let cached = self.cache.query(symbol, from.date_naive()).await?;
                tracing::warn!(
                    "History for {} unavailable ({}), serving {} cached bars",
                    symbol,
                    e,
                    cached.len()
                );
                Ok(cached.into_iter().map(|b| (b.date, b)).collect())
            }
        }
    }

    /// Daily closes of an index or symbol, ascending by date.
    pub async fn benchmark_series(&self, symbol: &str, days: i64) -> MarketDataResult<Vec<(NaiveDate, f64)>> {
        let bars = self.historical_bars(symbol, Resolution::Day, days).await?;
        Ok(bars.into_iter().map(|(date, bar)| (date, bar.close)).collect())
    }
}
