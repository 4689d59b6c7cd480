use analysis_core::{
    AnalyticsReport, BenchmarkComparison, CorrelationMatrix, OhlcvBar, PerformanceMetrics, SectorAllocation,
    SymbolInfo, Timeframe,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use market_data::Resolution;
use serde::{Deserialize, Serialize};

use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct TimeframeQuery {
    pub timeframe: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct BarsQuery {
    pub days: Option<i64>,
    pub resolution: Option<String>,
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub market_data_available: bool,
}

#[derive(Serialize)]
pub struct DiversificationResponse {
    pub portfolio_id: i64,
    pub diversification_score: f64,
}

#[derive(Serialize)]
pub struct QuoteResponse {
    pub symbol: String,
    pub price: Option<f64>,
}

#[derive(Serialize)]
pub struct CircuitStatus {
    pub available: bool,
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/analytics/:portfolio_id", get(get_report))
        .route("/api/v1/analytics/:portfolio_id/performance", get(get_performance))
        .route("/api/v1/analytics/:portfolio_id/sectors", get(get_sectors))
        .route("/api/v1/analytics/:portfolio_id/correlation", get(get_correlation))
        .route("/api/v1/analytics/:portfolio_id/diversification", get(get_diversification))
        .route("/api/v1/benchmark-comparison/:portfolio_id", get(get_benchmark_comparison))
}

pub fn market_data_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/market-data/search", get(search_symbols))
        .route("/api/v1/market-data/circuit/reset", post(reset_circuit))
        .route("/api/v1/market-data/:symbol", get(get_bars))
        .route("/api/v1/market-data/:symbol/quote", get(get_quote))
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        market_data_available: state.market.is_available(),
    })
}

/// GET /api/v1/analytics/:portfolio_id
async fn get_report(
    State(state): State<AppState>,
    Path(portfolio_id): Path<i64>,
) -> Result<Json<ApiResponse<AnalyticsReport>>, AppError> {
    let report = state.analytics.compute_report(portfolio_id).await;
    Ok(Json(ApiResponse::success(report)))
}

async fn get_performance(
    State(state): State<AppState>,
    Path(portfolio_id): Path<i64>,
) -> Result<Json<ApiResponse<PerformanceMetrics>>, AppError> {
    let metrics = state.analytics.compute_performance_metrics(portfolio_id).await;
    Ok(Json(ApiResponse::success(metrics)))
}

async fn get_sectors(
    State(state): State<AppState>,
    Path(portfolio_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<SectorAllocation>>>, AppError> {
    let allocation = state.analytics.compute_sector_allocation(portfolio_id).await;
    Ok(Json(ApiResponse::success(allocation)))
}

/// `data` is null with fewer than two holdings.
async fn get_correlation(
    State(state): State<AppState>,
    Path(portfolio_id): Path<i64>,
) -> Result<Json<ApiResponse<CorrelationMatrix>>, AppError> {
    let matrix = state.analytics.compute_correlation_matrix(portfolio_id).await;
    Ok(Json(ApiResponse {
        success: true,
        data: matrix,
        error: None,
    }))
}

async fn get_diversification(
    State(state): State<AppState>,
    Path(portfolio_id): Path<i64>,
) -> Result<Json<ApiResponse<DiversificationResponse>>, AppError> {
    let score = state.analytics.compute_diversification_score(portfolio_id).await;
    Ok(Json(ApiResponse::success(DiversificationResponse {
        portfolio_id,
        diversification_score: score,
    })))
}

/// GET /api/v1/benchmark-comparison/:portfolio_id?timeframe=1Y
///
/// Bounded by the analytics deadline; expiry is a 504.
async fn get_benchmark_comparison(
    State(state): State<AppState>,
    Path(portfolio_id): Path<i64>,
    Query(params): Query<TimeframeQuery>,
) -> Result<Json<ApiResponse<BenchmarkComparison>>, AppError> {
    let timeframe = match params.timeframe.as_deref() {
        Some(raw) => raw
            .parse::<Timeframe>()
            .map_err(|e| AppError::bad_request(e.to_string()))?,
        None => Timeframe::default(),
    };

    let deadline = state.analytics.settings().deadline;
    let comparison = tokio::time::timeout(deadline, state.analytics.compare_to_benchmark(portfolio_id, timeframe))
        .await
        .map_err(|_| {
            AppError::with_status(
                StatusCode::GATEWAY_TIMEOUT,
                anyhow::anyhow!(
                    "benchmark comparison for portfolio {} timed out after {}s",
                    portfolio_id,
                    deadline.as_secs()
                ),
            )
        })?;

    Ok(Json(ApiResponse::success(comparison)))
}

async fn search_symbols(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<SymbolInfo>>>, AppError> {
    let query = params.q.unwrap_or_default();
    let results = state.market.search_symbols(&query).await;
    Ok(Json(ApiResponse::success(results)))
}

const DEFAULT_BAR_DAYS: i64 = 30;
const MAX_BAR_DAYS: i64 = 365;

/// GET /api/v1/market-data/:symbol?days=30&resolution=D
async fn get_bars(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<BarsQuery>,
) -> Result<Json<ApiResponse<Vec<OhlcvBar>>>, AppError> {
    let resolution = match params.resolution.as_deref() {
        Some(raw) => raw
            .parse::<Resolution>()
            .map_err(|e| AppError::bad_request(e.to_string()))?,
        None => Resolution::Day,
    };
    let days = params.days.unwrap_or(DEFAULT_BAR_DAYS);
    if !(1..=MAX_BAR_DAYS).contains(&days) {
        return Err(AppError::bad_request(format!(
            "days must be between 1 and {}, got {}",
            MAX_BAR_DAYS, days
        )));
    }

    let bars = state
        .market
        .historical_bars(&symbol.to_uppercase(), resolution, days)
        .await?;

    Ok(Json(ApiResponse::success(bars.into_values().collect())))
}

async fn get_quote(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<QuoteResponse>>, AppError> {
    let symbol = symbol.to_uppercase();
    let price = state.market.latest_price(&symbol).await;
    Ok(Json(ApiResponse::success(QuoteResponse { symbol, price })))
}

async fn reset_circuit(State(state): State<AppState>) -> Result<Json<ApiResponse<CircuitStatus>>, AppError> {
    state.market.reset_circuit();
    tracing::info!("Market data circuit reset");
    Ok(Json(ApiResponse::success(CircuitStatus {
        available: state.market.is_available(),
    })))
}
