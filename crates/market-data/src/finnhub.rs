use analysis_core::{OhlcvBar, SymbolInfo};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::MarketDataConfig;
use crate::error::{MarketDataError, MarketDataResult, ProviderOutcome};
use crate::provider::{QuoteProvider, Resolution};

/// Finnhub REST provider. One call here is one network attempt.
#[derive(Clone)]
pub struct FinnhubProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

impl FinnhubProvider {
    pub fn new(config: &MarketDataConfig) -> MarketDataResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(MarketDataError::MissingCredentials);
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent("quant-analytics/0.1")
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ProviderOutcome<T> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = match self
            .client
            .get(&url)
            .query(params)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() || e.is_connect() => {
                return ProviderOutcome::TransientFailure(format!("{} {}", endpoint, e));
            }
            Err(e) => return ProviderOutcome::PermanentFailure(format!("{} {}", endpoint, e)),
        };

        let status = response.status();
        if status.as_u16() == 429 {
            return ProviderOutcome::TransientFailure(format!("{} rate limited (HTTP 429)", endpoint));
        }
        if !status.is_success() {
            return ProviderOutcome::PermanentFailure(format!(
                "{} HTTP {}: {}",
                endpoint,
                status,
                response.text().await.unwrap_or_default()
            ));
        }

        match response.json::<T>().await {
            Ok(body) => ProviderOutcome::Success(body),
            Err(e) if e.is_timeout() => {
                ProviderOutcome::TransientFailure(format!("{} body timeout: {}", endpoint, e))
            }
            Err(e) => ProviderOutcome::PermanentFailure(format!("{} malformed response: {}", endpoint, e)),
        }
    }
}

#[async_trait]
impl QuoteProvider for FinnhubProvider {
    async fn search(&self, query: &str) -> ProviderOutcome<Vec<SymbolInfo>> {
        self.get_json::<SearchResponse>("search", &[("q", query.to_string())])
            .await
            .map(symbols_from_search)
    }

    async fn quote(&self, symbol: &str) -> ProviderOutcome<Option<f64>> {
        self.get_json::<QuoteResponse>("quote", &[("symbol", symbol.to_string())])
            .await
            .map(|q| price_from_quote(&q))
    }

    async fn candles(
        &self,
        symbol: &str,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ProviderOutcome<Vec<OhlcvBar>> {
        let outcome = self
            .get_json::<CandleResponse>(
                "stock/candle",
                &[
                    ("symbol", symbol.to_string()),
                    ("resolution", resolution.as_str().to_string()),
                    ("from", from.timestamp().to_string()),
                    ("to", to.timestamp().to_string()),
                ],
            )
            .await;

        match outcome {
            ProviderOutcome::Success(body) => match bars_from_candles(body) {
                Ok(bars) => ProviderOutcome::Success(bars),
                Err(reason) => ProviderOutcome::PermanentFailure(format!("{}: {}", symbol, reason)),
            },
            ProviderOutcome::TransientFailure(e) => ProviderOutcome::TransientFailure(e),
            ProviderOutcome::PermanentFailure(e) => ProviderOutcome::PermanentFailure(e),
        }
    }

    fn name(&self) -> &'static str {
        "finnhub"
    }
}

fn symbols_from_search(body: SearchResponse) -> Vec<SymbolInfo> {
    body.result
        .into_iter()
        .filter_map(|r| {
            Some(SymbolInfo {
                symbol: r.symbol?,
                name: r.description,
                kind: r.kind,
                region: r.mic,
                currency: r.currency,
            })
        })
        .collect()
}

/// Finnhub reports `c = 0` for unknown symbols.
fn price_from_quote(q: &QuoteResponse) -> Option<f64> {
    q.c.filter(|p| p.is_finite() && *p > 0.0)
}

fn bars_from_candles(body: CandleResponse) -> Result<Vec<OhlcvBar>, String> {
    if body.s != "ok" {
        return Err(format!("unexpected candle status '{}'", body.s));
    }

    let n = body.t.len();
    if [body.o.len(), body.h.len(), body.l.len(), body.c.len(), body.v.len()]
        .iter()
        .any(|&len| len != n)
    {
        return Err("candle arrays have mismatched lengths".to_string());
    }

    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let date = DateTime::from_timestamp(body.t[i], 0)
            .ok_or_else(|| format!("invalid candle timestamp {}", body.t[i]))?
            .date_naive();
        bars.push(OhlcvBar {
            date,
            open: body.o[i],
            high: body.h[i],
            low: body.l[i],
            close: body.c[i],
            volume: body.v[i],
            // candles are already split/dividend adjusted
            adjusted_close: body.c[i],
        });
    }
    Ok(bars)
}

// Response structures
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    symbol: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    mic: Option<String>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    c: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CandleResponse {
    s: String,
    #[serde(default)]
    t: Vec<i64>,
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_candles_map_to_daily_bars() {
        let body: CandleResponse = serde_json::from_str(
            r#"{"s":"ok","t":[1704153600,1704240000],"o":[10.0,11.0],"h":[12.0,13.0],
                "l":[9.0,10.5],"c":[11.5,12.5],"v":[1000,2000]}"#,
        )
        .unwrap();
        let bars = bars_from_candles(body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[1].close, 12.5);
        assert_eq!(bars[1].adjusted_close, 12.5);
        assert_eq!(bars[1].volume, 2000.0);
    }

    #[test]
    fn test_no_data_status_is_rejected() {
        let body: CandleResponse = serde_json::from_str(r#"{"s":"no_data"}"#).unwrap();
        assert!(bars_from_candles(body).is_err());
    }

    #[test]
    fn test_mismatched_arrays_are_malformed() {
        let body: CandleResponse = serde_json::from_str(
            r#"{"s":"ok","t":[1704153600],"o":[1.0,2.0],"h":[1.0],"l":[1.0],"c":[1.0],"v":[1]}"#,
        )
        .unwrap();
        assert!(bars_from_candles(body).is_err());
    }

    #[test]
    fn test_zero_quote_means_unknown() {
        let q: QuoteResponse = serde_json::from_str(r#"{"c":0,"d":null}"#).unwrap();
        assert_eq!(price_from_quote(&q), None);
        let q: QuoteResponse = serde_json::from_str(r#"{"c":187.42}"#).unwrap();
        assert_eq!(price_from_quote(&q), Some(187.42));
    }

    #[test]
    fn test_search_skips_entries_without_symbol() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"count":2,"result":[{"description":"APPLE INC","symbol":"AAPL","type":"Common Stock"},
                {"description":"orphan"}]}"#,
        )
        .unwrap();
        let hits = symbols_from_search(body);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].symbol, "AAPL");
        assert_eq!(hits[0].kind.as_deref(), Some("Common Stock"));
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let cfg = MarketDataConfig::with_api_key("  ");
        assert!(matches!(FinnhubProvider::new(&cfg), Err(MarketDataError::MissingCredentials)));
    }
}
