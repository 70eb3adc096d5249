//! Products API
//!
//! - GET /api/products - Every product with inventory, priced at the user's day
//! - GET /api/products/:id/history - Closes up to the user's current day

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::{ApiResponse, UserQuery};
use crate::services::TradingError;
use crate::types::{Product, ProductHistory};
use crate::AppState;

/// Create products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/:id/history", get(product_history))
}

/// Query for the product list. Without a user, prices are the catalog's
/// first close.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductsQuery {
    pub user_id: Option<String>,
}

/// Product with its change against the previous close.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuote {
    #[serde(flatten)]
    pub product: Product,
    pub daily_change: f64,
    pub daily_change_pct: f64,
}

impl From<Product> for ProductQuote {
    fn from(product: Product) -> Self {
        Self {
            daily_change: product.daily_change(),
            daily_change_pct: product.daily_change_pct(),
            product,
        }
    }
}

/// GET /api/products?userId=
async fn list_products(
    State(state): State<AppState>,
    query: Result<Query<ProductsQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ProductQuote>>>, TradingError> {
    let Query(query) = query?;
    let quotes: Vec<ProductQuote> = state
        .trading_service
        .products(query.user_id.as_deref())?
        .into_iter()
        .map(ProductQuote::from)
        .collect();

    Ok(ApiResponse::ok(format!("{} products", quotes.len()), quotes))
}

/// GET /api/products/:id/history?userId=
async fn product_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<ProductHistory>>, TradingError> {
    let Query(query) = query?;
    let history = state.trading_service.product_history(&query.user_id, id)?;

    Ok(ApiResponse::ok("Price history", history))
}
