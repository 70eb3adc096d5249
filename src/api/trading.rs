//! Trading API
//!
//! - POST /api/trading/buy - Buy at the live price, appending a lot
//! - POST /api/trading/sell - Sell at the live price, consuming lots FIFO
//! - GET /api/trading/lots - List open lots, oldest first

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::ApiResponse;
use crate::services::{parse_quantity, TradingError};
use crate::types::{BuyReceipt, Holding, SellReceipt, TradeRequest};
use crate::AppState;

/// Create trading router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/buy", post(buy))
        .route("/sell", post(sell))
        .route("/lots", get(list_lots))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotsQuery {
    pub user_id: String,
    pub product_id: Option<i64>,
}

/// POST /api/trading/buy
async fn buy(
    State(state): State<AppState>,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<BuyReceipt>>, TradingError> {
    let Json(request) = payload?;
    let quantity = parse_quantity(&request.amount)?;

    let receipt = state
        .trading_service
        .buy(&request.user_id, request.product_id, quantity)?;

    let message = format!(
        "Bought {} {} at {:.2}",
        receipt.quantity, receipt.name, receipt.price
    );
    Ok(ApiResponse::ok(message, receipt))
}

/// POST /api/trading/sell
async fn sell(
    State(state): State<AppState>,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<SellReceipt>>, TradingError> {
    let Json(request) = payload?;
    let quantity = parse_quantity(&request.amount)?;

    let receipt = state
        .trading_service
        .sell(&request.user_id, request.product_id, quantity)?;

    let message = format!(
        "Sold {} {} at {:.2}, profit {:.2}",
        receipt.summary.sold_quantity,
        receipt.name,
        receipt.sell_price,
        receipt.summary.total_profit
    );
    Ok(ApiResponse::ok(message, receipt))
}

/// GET /api/trading/lots?userId=&productId=
async fn list_lots(
    State(state): State<AppState>,
    query: Result<Query<LotsQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Holding>>>, TradingError> {
    let Query(query) = query?;
    let lots = state
        .trading_service
        .list_lots(&query.user_id, query.product_id)?;

    Ok(ApiResponse::ok(format!("{} open lots", lots.len()), lots))
}
