//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use stock_sim::config::GameConfig;
use stock_sim::services::{AnalyticsStore, DayClock, PriceSeriesStore, SqliteStore, TradingService};
use stock_sim::AppState;

pub const CATALOG: &str = r#"{
    "products": [
        {"code": "ACME", "name": "Acme Corp", "type": "stock",
         "series": [
            {"date": "2024-01-02", "close": 100.0},
            {"date": "2024-01-03", "close": 110.0},
            {"date": "2024-01-04", "close": 104.5},
            {"date": "2024-01-05", "close": 120.0}
         ]},
        {"code": "BOLT", "name": "Bolt Motors", "type": "stock",
         "series": [
            {"date": "2024-01-02", "close": 50.0},
            {"date": "2024-01-03", "close": 45.0},
            {"date": "2024-01-04", "close": 40.0},
            {"date": "2024-01-05", "close": 55.0}
         ]},
        {"code": "IDX", "name": "Index Fund", "type": "fund",
         "series": [
            {"date": "2024-01-02", "close": 10.0},
            {"date": "2024-01-03", "close": 10.2},
            {"date": "2024-01-04", "close": 10.4}
         ]}
    ]
}"#;

pub const ACME: i64 = 1;
pub const BOLT: i64 = 2;
pub const IDX: i64 = 3;

pub struct TestGame {
    pub trading: Arc<TradingService>,
    pub clock: Arc<DayClock>,
}

pub fn test_game() -> TestGame {
    let game = GameConfig::default();
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let prices = Arc::new(PriceSeriesStore::from_json(CATALOG).unwrap());
    store.seed_products(prices.listings(), &game).unwrap();
    let analytics = AnalyticsStore::in_memory(game.assets_history_window);

    let trading = Arc::new(TradingService::new(
        store.clone(),
        prices.clone(),
        analytics.clone(),
        game,
    ));
    let clock = Arc::new(DayClock::new(store, prices, analytics));

    TestGame { trading, clock }
}

pub fn test_state() -> AppState {
    let game = test_game();
    AppState {
        trading_service: game.trading,
        clock: game.clock,
    }
}
