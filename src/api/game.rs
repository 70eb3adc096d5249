//! Game API
//!
//! - POST /api/game/init - Start a game for a user
//! - POST /api/game/advance - Advance the user's simulation by one day
//! - POST /api/game/restart - Wipe the user's game
//! - GET /api/game/status - Current day, remaining days and balance

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    routing::{get, post},
    Json, Router,
};

use crate::api::{ApiResponse, UserQuery};
use crate::services::TradingError;
use crate::types::{DayAdvance, GameStatus, InitGameRequest, RestartOutcome, UserRequest};
use crate::AppState;

/// Create game router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/init", post(init_game))
        .route("/advance", post(advance_day))
        .route("/restart", post(restart_game))
        .route("/status", get(game_status))
}

/// POST /api/game/init
async fn init_game(
    State(state): State<AppState>,
    payload: Result<Json<InitGameRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<GameStatus>>, TradingError> {
    let Json(request) = payload?;
    let status = state.trading_service.init_game(
        &request.user_id,
        request.initial_balance,
        request.remain_days,
    )?;

    Ok(ApiResponse::ok("Game initialized", status))
}

/// POST /api/game/advance
async fn advance_day(
    State(state): State<AppState>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<DayAdvance>>, TradingError> {
    let Json(request) = payload?;
    let advance = state.clock.advance_day(&request.user_id)?;

    let message = if advance.game_over {
        format!("Advanced to day {}. Game over", advance.day)
    } else {
        format!("Advanced to day {}", advance.day)
    };
    Ok(ApiResponse::ok(message, advance))
}

/// POST /api/game/restart
async fn restart_game(
    State(state): State<AppState>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<RestartOutcome>>, TradingError> {
    let Json(request) = payload?;
    let outcome = state.trading_service.restart_game(&request.user_id)?;

    Ok(ApiResponse::ok("Game restarted", outcome))
}

/// GET /api/game/status?userId=
async fn game_status(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<GameStatus>>, TradingError> {
    let Query(query) = query?;
    let status = state.trading_service.game_status(&query.user_id)?;

    Ok(ApiResponse::ok("Game status", status))
}
