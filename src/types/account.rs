//! Game account types.

use serde::{Deserialize, Serialize};

/// Lifecycle of a user's game. `GameOver` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    Active,
    GameOver,
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameState::Active => write!(f, "active"),
            GameState::GameOver => write!(f, "game_over"),
        }
    }
}

/// A user's cash balance and simulation progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGameAccount {
    pub user_id: String,
    /// Current cash balance, never negative
    pub balance: f64,
    /// Cash the game was started with
    pub initial_balance: f64,
    pub remain_days: i64,
    pub max_day: i64,
    /// Index into the price series for this user
    pub current_day: i64,
    pub game_over: bool,
    /// When the game was started (ms)
    pub created_at: i64,
    /// When the account last changed (ms)
    pub updated_at: i64,
}

impl UserGameAccount {
    /// Create a fresh account at day zero.
    pub fn new(user_id: String, initial_balance: f64, max_day: i64) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            user_id,
            balance: initial_balance,
            initial_balance,
            remain_days: max_day,
            max_day,
            current_day: 0,
            game_over: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> GameState {
        if self.game_over {
            GameState::GameOver
        } else {
            GameState::Active
        }
    }
}

/// Request to start a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitGameRequest {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remain_days: Option<i64>,
}

/// Request body carrying only a user id (advance, restart).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub user_id: String,
}

/// Game status projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatus {
    pub user_id: String,
    pub state: GameState,
    pub current_day: i64,
    pub remain_days: i64,
    pub max_day: i64,
    pub game_over: bool,
    pub balance: f64,
    pub initial_balance: f64,
}

impl From<&UserGameAccount> for GameStatus {
    fn from(account: &UserGameAccount) -> Self {
        Self {
            user_id: account.user_id.clone(),
            state: account.state(),
            current_day: account.current_day,
            remain_days: account.remain_days,
            max_day: account.max_day,
            game_over: account.game_over,
            balance: account.balance,
            initial_balance: account.initial_balance,
        }
    }
}

/// Result of restarting a user's game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartOutcome {
    pub user_id: String,
    pub lots_removed: usize,
    pub account_removed: bool,
    pub products_reset: usize,
}
