//! HTTP surface over the portfolio analytics service and the market data client.

pub mod config;
mod routes;

use anyhow::Context;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use market_data::{FinnhubProvider, MarketDataClient, OhlcvCache};
use portfolio_analytics::{AnalyticsService, SqlitePortfolioStore};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub analytics: Arc<AnalyticsService>,
    /// The one client instance every handler and the analytics share.
    pub market: MarketDataClient,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Handler error rendered as `{ "success": false, "error": ... }`.
pub struct AppError {
    status: StatusCode,
    inner: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, inner: anyhow::Error) -> Self {
        Self { status, inner }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!(message.into()))
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed ({}): {:#}", self.status, self.inner);
        } else {
            tracing::warn!("Request rejected ({}): {:#}", self.status, self.inner);
        }

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.inner.to_string()),
        };
        (self.status, Json(body)).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::analytics_routes())
        .merge(routes::market_data_routes())
        .with_state(state)
}

/// Wire the client, store and analytics to one SQLite database.
pub async fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .with_context(|| format!("invalid DATABASE_URL {}", config.database_url))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("failed to open database")?;

    let cache = OhlcvCache::from_pool(pool.clone())
        .await
        .context("failed to initialize OHLCV cache")?;
    let store = SqlitePortfolioStore::from_pool(pool)
        .await
        .context("failed to initialize portfolio store")?;

    let provider = FinnhubProvider::new(&config.market).context("market data provider")?;
    let market = MarketDataClient::new(Arc::new(provider), cache, &config.market);

    let analytics = AnalyticsService::new(
        Arc::new(store),
        Arc::new(market.clone()),
        config.analytics.clone(),
    );

    Ok(AppState {
        analytics: Arc::new(analytics),
        market,
    })
}

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    let json_logs = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env().context("FINNHUB_API_KEY must be set")?;
    tracing::info!(
        "Starting quant server (database={}, benchmark={}, deadline={}s)",
        config.database_url,
        config.analytics.benchmark_symbol,
        config.analytics.deadline.as_secs()
    );

    let state = build_state(&config).await?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
