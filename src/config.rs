use std::env;

/// Game rules and defaults.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Cash a new game starts with when the request gives none.
    pub default_initial_balance: f64,
    /// Simulation days a new game runs when the request gives none.
    pub default_max_days: i64,
    /// Inventory of each stock after a restart.
    pub stock_initial_quantity: i64,
    /// Inventory of each fund after a restart.
    pub fund_initial_quantity: i64,
    /// Total-assets history entries kept per user.
    pub assets_history_window: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            default_initial_balance: 500_000.0,
            default_max_days: 30,
            stock_initial_quantity: 1000,
            fund_initial_quantity: 2000,
            assets_history_window: 30,
        }
    }
}

impl GameConfig {
    /// Initial inventory for a product type.
    pub fn initial_quantity(&self, product_type: crate::types::ProductType) -> i64 {
        match product_type {
            crate::types::ProductType::Stock => self.stock_initial_quantity,
            crate::types::ProductType::Fund => self.fund_initial_quantity,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database file.
    pub database_path: String,
    /// JSON price catalog replayed by the day clock.
    pub price_data_path: String,
    /// Game rules.
    pub game: GameConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = GameConfig::default();

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "stock_sim.db".to_string()),
            price_data_path: env::var("PRICE_DATA_PATH")
                .unwrap_or_else(|_| "data/prices.json".to_string()),
            game: GameConfig {
                default_initial_balance: env::var("DEFAULT_INITIAL_BALANCE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|v: &f64| v.is_finite() && *v > 0.0)
                    .unwrap_or(defaults.default_initial_balance),
                default_max_days: env::var("DEFAULT_MAX_DAYS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|v: &i64| *v > 0)
                    .unwrap_or(defaults.default_max_days),
                stock_initial_quantity: env::var("STOCK_INITIAL_QUANTITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|v: &i64| *v >= 0)
                    .unwrap_or(defaults.stock_initial_quantity),
                fund_initial_quantity: env::var("FUND_INITIAL_QUANTITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|v: &i64| *v >= 0)
                    .unwrap_or(defaults.fund_initial_quantity),
                assets_history_window: env::var("ASSETS_HISTORY_WINDOW")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|v: &usize| *v > 0)
                    .unwrap_or(defaults.assets_history_window),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
