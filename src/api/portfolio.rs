//! Portfolio API
//!
//! - GET /api/portfolio - Cash, holdings and total assets
//! - GET /api/portfolio/performance - Realized and unrealized profit
//! - GET /api/portfolio/assets-history - Total assets per day
//! - GET /api/portfolio/contributions - Profit per product

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};

use crate::api::{ApiResponse, UserQuery};
use crate::services::TradingError;
use crate::types::{Contribution, Performance, PortfolioView, TotalAssetsRecord};
use crate::AppState;

/// Create portfolio router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/portfolio", get(get_portfolio))
        .route("/api/portfolio/performance", get(get_performance))
        .route("/api/portfolio/assets-history", get(get_assets_history))
        .route("/api/portfolio/contributions", get(get_contributions))
}

/// GET /api/portfolio?userId=
async fn get_portfolio(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<PortfolioView>>, TradingError> {
    let Query(query) = query?;
    let view = state.trading_service.portfolio(&query.user_id)?;

    Ok(ApiResponse::ok("Portfolio", view))
}

/// GET /api/portfolio/performance?userId=
async fn get_performance(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Performance>>, TradingError> {
    let Query(query) = query?;
    let performance = state.trading_service.performance(&query.user_id)?;

    Ok(ApiResponse::ok("Performance", performance))
}

/// GET /api/portfolio/assets-history?userId=
async fn get_assets_history(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<TotalAssetsRecord>>>, TradingError> {
    let Query(query) = query?;
    let history = state.trading_service.assets_history(&query.user_id)?;

    Ok(ApiResponse::ok("Assets history", history))
}

/// GET /api/portfolio/contributions?userId=
async fn get_contributions(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Contribution>>>, TradingError> {
    let Query(query) = query?;
    let contributions = state.trading_service.contributions(&query.user_id)?;

    Ok(ApiResponse::ok("Profit contributions", contributions))
}
