use std::env;

use market_data::MarketDataConfig;
use portfolio_analytics::AnalyticsSettings;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8004;
pub const DEFAULT_DATABASE_URL: &str = "sqlite:quant.db";

/// Everything the server needs at startup, read once from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Shared by the OHLCV cache and the portfolio store.
    pub database_url: String,
    pub market: MarketDataConfig,
    pub analytics: AnalyticsSettings,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let market = MarketDataConfig::from_env()?;

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            database_url: env::var("DATABASE_URL")
                .ok()
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            market,
            analytics: AnalyticsSettings::from_env(),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
