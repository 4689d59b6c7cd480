use analysis_core::{OhlcvBar, SymbolInfo};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::{MarketDataError, ProviderOutcome};

/// Candle resolution accepted by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    Minute1,
    Minute5,
    Minute15,
    Minute30,
    Minute60,
    Day,
    Week,
    Month,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Minute1 => "1",
            Resolution::Minute5 => "5",
            Resolution::Minute15 => "15",
            Resolution::Minute30 => "30",
            Resolution::Minute60 => "60",
            Resolution::Day => "D",
            Resolution::Week => "W",
            Resolution::Month => "M",
        }
    }
}

impl FromStr for Resolution {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Resolution::Minute1),
            "5" => Ok(Resolution::Minute5),
            "15" => Ok(Resolution::Minute15),
            "30" => Ok(Resolution::Minute30),
            "60" => Ok(Resolution::Minute60),
            "D" | "d" => Ok(Resolution::Day),
            "W" | "w" => Ok(Resolution::Week),
            "M" => Ok(Resolution::Month),
            other => Err(MarketDataError::InvalidResolution(other.to_string())),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upstream quote/history source. Each method is a single network
/// attempt; retries, pacing and fallback live in `MarketDataClient`.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn search(&self, query: &str) -> ProviderOutcome<Vec<SymbolInfo>>;

    /// Latest trade price, `None` when the provider knows no price.
    async fn quote(&self, symbol: &str) -> ProviderOutcome<Option<f64>>;

    async fn candles(
        &self,
        symbol: &str,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ProviderOutcome<Vec<OhlcvBar>>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_roundtrip_labels() {
        for label in ["1", "5", "15", "30", "60", "D", "W", "M"] {
            let r: Resolution = label.parse().unwrap();
            assert_eq!(r.as_str(), label);
        }
    }

    #[test]
    fn test_invalid_resolution_is_config_error() {
        let err = "2H".parse::<Resolution>().unwrap_err();
        assert!(matches!(err, MarketDataError::InvalidResolution(ref s) if s == "2H"));
        // lowercase "m" is ambiguous with minutes and rejected
        assert!("m".parse::<Resolution>().is_err());
    }
}
