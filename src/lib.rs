//! stock-sim - paper trading game over replayed daily closes

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod types;

use services::{DayClock, TradingService};
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub trading_service: Arc<TradingService>,
    pub clock: Arc<DayClock>,
}

// Re-export commonly used types
pub use types::*;
