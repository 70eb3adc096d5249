pub mod game;
pub mod health;
pub mod portfolio;
pub mod products;
pub mod trading;

use crate::services::TradingError;
use crate::AppState;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(portfolio::router())
        .merge(products::router())
        .nest("/api/game", game::router())
        .nest("/api/trading", trading::router())
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: String,
}

/// Query carrying only a user id.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: String,
}

/// Convert TradingError to HTTP response.
impl IntoResponse for TradingError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            TradingError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            TradingError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "PRODUCT_NOT_FOUND"),
            TradingError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "GAME_NOT_FOUND"),
            TradingError::GameAlreadyInitialized(_) => {
                (StatusCode::CONFLICT, "GAME_ALREADY_INITIALIZED")
            }
            TradingError::InsufficientFunds { .. } => (StatusCode::CONFLICT, "INSUFFICIENT_FUNDS"),
            TradingError::OutOfStock { .. } => (StatusCode::CONFLICT, "OUT_OF_STOCK"),
            TradingError::InsufficientHoldings { .. } => {
                (StatusCode::CONFLICT, "INSUFFICIENT_HOLDINGS")
            }
            TradingError::GameAlreadyOver => (StatusCode::CONFLICT, "GAME_OVER"),
            TradingError::NoRemainingDays => (StatusCode::CONFLICT, "NO_REMAINING_DAYS"),
            TradingError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Rejected request: {}", self);
        }

        let body = Json(ErrorResponse {
            success: false,
            message: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<JsonRejection> for TradingError {
    fn from(rejection: JsonRejection) -> Self {
        TradingError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for TradingError {
    fn from(rejection: QueryRejection) -> Self {
        TradingError::Validation(rejection.body_text())
    }
}
