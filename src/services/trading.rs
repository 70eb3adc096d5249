//! Trading Service
//!
//! Paper trading against the simulated market:
//! - Game lifecycle (init, restart, status)
//! - Buys that append a purchase lot
//! - Sells that consume lots FIFO and realize profit
//! - Portfolio and performance projections
//!
//! Every check-then-act sequence runs inside one SQLite transaction. Analytics
//! are updated after commit and never fail a trade.

use crate::config::GameConfig;
use crate::services::analytics::{AnalyticsError, AnalyticsStore};
use crate::services::price_series::PriceSeriesStore;
use crate::services::sqlite_store::{LedgerError, SqliteStore};
use crate::types::{
    BuyReceipt, Contribution, GameStatus, Holding, Performance, PortfolioHolding, PortfolioView,
    Product, ProductHistory, RealizedSale, RestartOutcome, SellReceipt, SellSummary, SoldLot,
    TotalAssetsRecord, UserGameAccount,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Trading service errors.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    #[error("No game for user: {0}")]
    AccountNotFound(String),

    #[error("Game already initialized for user: {0}")]
    GameAlreadyInitialized(String),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: f64, available: f64 },

    #[error("Out of stock: requested {requested}, available {available}")]
    OutOfStock { requested: i64, available: i64 },

    #[error("Insufficient holdings: requested {requested}, held {held}")]
    InsufficientHoldings { requested: i64, held: i64 },

    #[error("Game is over")]
    GameAlreadyOver,

    #[error("No remaining days")]
    NoRemainingDays,

    #[error("Database error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for TradingError {
    fn from(e: rusqlite::Error) -> Self {
        TradingError::Storage(e.to_string())
    }
}

impl From<LedgerError> for TradingError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::UnknownProduct(id) => TradingError::ProductNotFound(id),
            LedgerError::UnknownAccount(user) => TradingError::AccountNotFound(user),
            LedgerError::InsufficientFunds { needed, available } => {
                TradingError::InsufficientFunds { needed, available }
            }
            LedgerError::InsufficientInventory {
                requested,
                available,
            } => TradingError::OutOfStock {
                requested,
                available,
            },
            LedgerError::InsufficientHoldings { requested, held } => {
                TradingError::InsufficientHoldings { requested, held }
            }
            LedgerError::Storage(e) => TradingError::Storage(e.to_string()),
        }
    }
}

impl From<AnalyticsError> for TradingError {
    fn from(e: AnalyticsError) -> Self {
        TradingError::Storage(e.to_string())
    }
}

/// Parse a trade amount given as a JSON integer or a numeric string.
pub fn parse_quantity(amount: &Value) -> Result<i64, TradingError> {
    let quantity = match amount {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .ok_or_else(|| {
                TradingError::Validation(format!("amount must be a whole number, got {}", n))
            })?,
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| {
            TradingError::Validation(format!("amount must be a whole number, got {:?}", s))
        })?,
        other => {
            return Err(TradingError::Validation(format!(
                "amount must be a number, got {}",
                other
            )))
        }
    };

    validate_quantity(quantity)?;
    Ok(quantity)
}

fn validate_quantity(quantity: i64) -> Result<(), TradingError> {
    if quantity <= 0 {
        return Err(TradingError::Validation(format!(
            "amount must be positive, got {}",
            quantity
        )));
    }
    Ok(())
}

pub(crate) fn validate_user(user_id: &str) -> Result<(), TradingError> {
    if user_id.trim().is_empty() {
        return Err(TradingError::Validation("userId is required".to_string()));
    }
    Ok(())
}

/// Paper trading service.
#[derive(Clone)]
pub struct TradingService {
    /// Ledger database
    store: Arc<SqliteStore>,
    /// Historical closes
    prices: Arc<PriceSeriesStore>,
    /// Derived profit analytics
    analytics: Arc<AnalyticsStore>,
    /// Game rules
    config: GameConfig,
}

impl TradingService {
    /// Create a new trading service.
    pub fn new(
        store: Arc<SqliteStore>,
        prices: Arc<PriceSeriesStore>,
        analytics: Arc<AnalyticsStore>,
        config: GameConfig,
    ) -> Self {
        Self {
            store,
            prices,
            analytics,
            config,
        }
    }

    pub fn analytics(&self) -> &Arc<AnalyticsStore> {
        &self.analytics
    }

    // ========== Game Lifecycle ==========

    /// Start a game for a user at day zero.
    pub fn init_game(
        &self,
        user_id: &str,
        initial_balance: Option<f64>,
        remain_days: Option<i64>,
    ) -> Result<GameStatus, TradingError> {
        validate_user(user_id)?;

        let initial_balance = initial_balance.unwrap_or(self.config.default_initial_balance);
        if !initial_balance.is_finite() || initial_balance <= 0.0 {
            return Err(TradingError::Validation(format!(
                "initialBalance must be positive, got {}",
                initial_balance
            )));
        }
        let max_day = remain_days.unwrap_or(self.config.default_max_days);
        if max_day <= 0 {
            return Err(TradingError::Validation(format!(
                "remainDays must be positive, got {}",
                max_day
            )));
        }

        let account = self.store.with_transaction(|tx| -> Result<_, TradingError> {
            if tx.account(user_id)?.is_some() {
                return Err(TradingError::GameAlreadyInitialized(user_id.to_string()));
            }

            let account = UserGameAccount::new(user_id.to_string(), initial_balance, max_day);
            tx.insert_account(&account)?;

            for product in tx.products()? {
                let (Some(price), Some(previous)) = (
                    self.prices.close_at(&product.code, product.product_type, 0),
                    self.prices
                        .previous_close_at(&product.code, product.product_type, 0),
                ) else {
                    continue;
                };
                tx.set_user_price(user_id, product.id, price, previous)?;
            }

            Ok(account)
        })?;

        if let Err(e) =
            self.analytics
                .record_total_assets(user_id, account.balance, account.balance, 0.0, 0)
        {
            warn!("Failed to seed assets history for {}: {}", user_id, e);
        }

        info!(
            "Started game for {} with {:.2} over {} days",
            user_id, initial_balance, max_day
        );
        Ok(GameStatus::from(&account))
    }

    /// Wipe a user's holdings, prices, account and analytics and restore
    /// inventories.
    ///
    /// Restarting a user with no game is not an error.
    pub fn restart_game(&self, user_id: &str) -> Result<RestartOutcome, TradingError> {
        validate_user(user_id)?;

        let outcome = self.store.with_transaction(|tx| -> Result<_, TradingError> {
            let lots_removed = tx.delete_user_lots(user_id)?;
            tx.delete_user_prices(user_id)?;
            let account_removed = tx.delete_account(user_id)?;
            let products_reset = tx.reset_inventories(
                self.config.stock_initial_quantity,
                self.config.fund_initial_quantity,
            )?;

            Ok(RestartOutcome {
                user_id: user_id.to_string(),
                lots_removed,
                account_removed,
                products_reset,
            })
        })?;

        if let Err(e) = self.analytics.clear(user_id) {
            warn!("Failed to clear analytics for {}: {}", user_id, e);
        }

        info!(
            "Restarted game for {} ({} lots removed)",
            user_id, outcome.lots_removed
        );
        Ok(outcome)
    }

    /// Current game state of a user.
    pub fn game_status(&self, user_id: &str) -> Result<GameStatus, TradingError> {
        let account = self.load_account(user_id)?;
        Ok(GameStatus::from(&account))
    }

    fn load_account(&self, user_id: &str) -> Result<UserGameAccount, TradingError> {
        validate_user(user_id)?;
        self.store
            .read(|tx| tx.account(user_id))?
            .ok_or_else(|| TradingError::AccountNotFound(user_id.to_string()))
    }

    /// Reject unknown products and users before taking the write lock.
    fn ensure_known(&self, user_id: &str, product_id: i64) -> Result<(), TradingError> {
        if !self.store.product_exists(product_id)? {
            return Err(TradingError::ProductNotFound(product_id));
        }
        if !self.store.account_exists(user_id)? {
            return Err(TradingError::AccountNotFound(user_id.to_string()));
        }
        Ok(())
    }

    // ========== Trade Execution ==========

    /// Buy `quantity` units at the user's live price, appending one lot.
    pub fn buy(
        &self,
        user_id: &str,
        product_id: i64,
        quantity: i64,
    ) -> Result<BuyReceipt, TradingError> {
        validate_user(user_id)?;
        validate_quantity(quantity)?;
        self.ensure_known(user_id, product_id)?;

        let receipt = self.store.with_transaction(|tx| -> Result<_, TradingError> {
            let account = tx
                .account(user_id)?
                .ok_or_else(|| TradingError::AccountNotFound(user_id.to_string()))?;
            if account.game_over {
                return Err(TradingError::GameAlreadyOver);
            }

            let product = tx
                .user_product(user_id, product_id)?
                .ok_or(TradingError::ProductNotFound(product_id))?;
            if product.available_quantity < quantity {
                return Err(TradingError::OutOfStock {
                    requested: quantity,
                    available: product.available_quantity,
                });
            }

            let price = product.current_price;
            let total_cost = price * quantity as f64;
            if account.balance < total_cost {
                return Err(TradingError::InsufficientFunds {
                    needed: total_cost,
                    available: account.balance,
                });
            }

            let remaining_inventory = tx.reserve_and_decrement_inventory(product_id, quantity)?;
            let balance = tx.reserve_and_debit(user_id, total_cost)?;
            let lot_id = tx.add_lot(user_id, product_id, price, quantity)?;

            Ok(BuyReceipt {
                lot_id,
                product_id,
                code: product.code,
                name: product.name,
                quantity,
                price,
                total_cost,
                remaining_inventory,
                balance,
            })
        })?;

        info!(
            "Executed buy {} x{} at {} for {}",
            receipt.code, quantity, receipt.price, user_id
        );
        self.refresh_analytics(user_id);
        Ok(receipt)
    }

    /// Sell `quantity` units at the user's live price, consuming lots oldest
    /// first.
    pub fn sell(
        &self,
        user_id: &str,
        product_id: i64,
        quantity: i64,
    ) -> Result<SellReceipt, TradingError> {
        validate_user(user_id)?;
        validate_quantity(quantity)?;
        self.ensure_known(user_id, product_id)?;

        let receipt = self.store.with_transaction(|tx| -> Result<_, TradingError> {
            let account = tx
                .account(user_id)?
                .ok_or_else(|| TradingError::AccountNotFound(user_id.to_string()))?;
            if account.game_over {
                return Err(TradingError::GameAlreadyOver);
            }

            let product = tx
                .user_product(user_id, product_id)?
                .ok_or(TradingError::ProductNotFound(product_id))?;
            let sell_price = product.current_price;

            let consumed = tx.consume_fifo(user_id, product_id, quantity)?;
            let lots: Vec<SoldLot> = consumed
                .iter()
                .map(|c| {
                    let cost = c.buy_price * c.consumed_quantity as f64;
                    let profit = (sell_price - c.buy_price) * c.consumed_quantity as f64;
                    SoldLot {
                        lot_id: c.lot_id,
                        quantity: c.consumed_quantity,
                        buy_price: c.buy_price,
                        sell_price,
                        profit,
                        profit_percentage: if cost > 0.0 { profit / cost * 100.0 } else { 0.0 },
                        closed: c.remaining_quantity == 0,
                    }
                })
                .collect();
            let summary = SellSummary::from_lots(&lots, sell_price);

            let balance = tx.credit(user_id, summary.total_sell_value)?;
            let remaining_inventory = tx.increment_inventory(product_id, quantity)?;

            Ok(SellReceipt {
                product_id,
                code: product.code,
                name: product.name,
                sell_price,
                lots,
                summary,
                remaining_inventory,
                balance,
            })
        })?;

        info!(
            "Executed sell {} x{} at {} for {} (profit {:.2})",
            receipt.code, quantity, receipt.sell_price, user_id, receipt.summary.total_profit
        );

        let sale = RealizedSale {
            product_id,
            product_name: receipt.name.clone(),
            profit: receipt.summary.total_profit,
            profit_percentage: receipt.summary.total_profit_percentage,
            sell_price: receipt.sell_price,
            sold_quantity: receipt.summary.sold_quantity,
            original_cost: receipt.summary.total_buy_value,
        };
        if let Err(e) = self.analytics.record_realized_profit(user_id, sale) {
            warn!("Failed to record realized profit for {}: {}", user_id, e);
        }
        self.refresh_analytics(user_id);

        Ok(receipt)
    }

    /// Recompute unrealized profit and the current day's total assets.
    fn refresh_analytics(&self, user_id: &str) {
        let writer = self.analytics.snapshot_writer();
        let state = self.store.read(|tx| -> Result<_, rusqlite::Error> {
            let Some(account) = tx.account(user_id)? else {
                return Ok(None);
            };
            Ok(Some((account, tx.holdings_snapshot(user_id)?)))
        });

        match state {
            Ok(Some((account, holdings))) => {
                if let Err(e) =
                    writer.record(user_id, &holdings, account.balance, account.current_day)
                {
                    warn!("Failed to update analytics for {}: {}", user_id, e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to read holdings for {}: {}", user_id, e),
        }
    }

    // ========== Queries ==========

    /// A user's open lots, oldest first, optionally for one product.
    pub fn list_lots(
        &self,
        user_id: &str,
        product_id: Option<i64>,
    ) -> Result<Vec<Holding>, TradingError> {
        self.load_account(user_id)?;

        let lots = match product_id {
            Some(id) => {
                if !self.store.product_exists(id)? {
                    return Err(TradingError::ProductNotFound(id));
                }
                self.store.read(|tx| tx.list_lots_fifo(user_id, id))?
            }
            None => self.store.read(|tx| tx.user_lots(user_id))?,
        };
        Ok(lots)
    }

    /// Cash, holdings at live prices and total assets.
    pub fn portfolio(&self, user_id: &str) -> Result<PortfolioView, TradingError> {
        validate_user(user_id)?;

        let (account, holdings) = self.store.read(|tx| -> Result<_, TradingError> {
            let account = tx
                .account(user_id)?
                .ok_or_else(|| TradingError::AccountNotFound(user_id.to_string()))?;
            Ok((account, tx.holdings_snapshot(user_id)?))
        })?;

        let portfolio_value: f64 = holdings.iter().map(|h| h.current_value).sum();
        let total_assets = account.balance + portfolio_value;
        let total_return_pct = if account.initial_balance > 0.0 {
            (total_assets - account.initial_balance) / account.initial_balance * 100.0
        } else {
            0.0
        };

        Ok(PortfolioView {
            user_id: account.user_id,
            current_day: account.current_day,
            balance: account.balance,
            portfolio_value,
            total_assets,
            initial_balance: account.initial_balance,
            total_return_pct,
            holdings: holdings.into_iter().map(PortfolioHolding::from).collect(),
        })
    }

    /// Realized and unrealized profit with the summary.
    pub fn performance(&self, user_id: &str) -> Result<Performance, TradingError> {
        self.load_account(user_id)?;
        self.refresh_analytics(user_id);

        Ok(Performance {
            user_id: user_id.to_string(),
            summary: self.analytics.summary(user_id)?,
            realized: self.analytics.realized(user_id)?,
            unrealized: self.analytics.unrealized(user_id)?,
        })
    }

    /// Total-assets history, oldest day first.
    pub fn assets_history(&self, user_id: &str) -> Result<Vec<TotalAssetsRecord>, TradingError> {
        self.load_account(user_id)?;
        Ok(self.analytics.history(user_id)?)
    }

    /// Profit per product, realized plus unrealized, with its share of the
    /// summed absolute profit.
    pub fn contributions(&self, user_id: &str) -> Result<Vec<Contribution>, TradingError> {
        self.load_account(user_id)?;

        let realized = self.analytics.realized(user_id)?;
        let holdings = self.store.read(|tx| tx.holdings_snapshot(user_id))?;

        let mut by_product: BTreeMap<i64, Contribution> = BTreeMap::new();
        for record in realized {
            let entry = by_product
                .entry(record.product_id)
                .or_insert_with(|| empty_contribution(record.product_id, &record.product_name));
            entry.realized_profit += record.total_profit;
        }
        for holding in &holdings {
            let entry = by_product
                .entry(holding.product_id)
                .or_insert_with(|| empty_contribution(holding.product_id, &holding.name));
            entry.unrealized_profit += holding.unrealized_profit();
        }

        let mut contributions: Vec<Contribution> = by_product.into_values().collect();
        for c in &mut contributions {
            c.total_profit = c.realized_profit + c.unrealized_profit;
        }

        let gross: f64 = contributions.iter().map(|c| c.total_profit.abs()).sum();
        if gross > 0.0 {
            for c in &mut contributions {
                c.contribution_pct = c.total_profit / gross * 100.0;
            }
        }

        debug!(
            "Computed {} contributions for {}",
            contributions.len(),
            user_id
        );
        Ok(contributions)
    }

    /// Every product with its inventory, priced at the user's day when one is
    /// given and at the catalog's first close otherwise.
    pub fn products(&self, user_id: Option<&str>) -> Result<Vec<Product>, TradingError> {
        match user_id {
            Some(user_id) => {
                self.load_account(user_id)?;
                Ok(self.store.read(|tx| tx.user_products(user_id))?)
            }
            None => Ok(self.store.read(|tx| tx.products())?),
        }
    }

    /// Closes of a product up to the user's current day.
    pub fn product_history(
        &self,
        user_id: &str,
        product_id: i64,
    ) -> Result<ProductHistory, TradingError> {
        let account = self.load_account(user_id)?;
        let product = self
            .store
            .read(|tx| tx.product(product_id))?
            .ok_or(TradingError::ProductNotFound(product_id))?;

        let points = self
            .prices
            .history_until(&product.code, product.product_type, account.current_day)
            .ok_or(TradingError::ProductNotFound(product_id))?;

        Ok(ProductHistory {
            product_id,
            code: product.code,
            name: product.name,
            current_day: account.current_day,
            points,
        })
    }
}

fn empty_contribution(product_id: i64, product_name: &str) -> Contribution {
    Contribution {
        product_id,
        product_name: product_name.to_string(),
        realized_profit: 0.0,
        unrealized_profit: 0.0,
        total_profit: 0.0,
        contribution_pct: 0.0,
    }
}
