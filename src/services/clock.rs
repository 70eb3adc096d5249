//! Day-advance clock.
//!
//! Each user has their own day pointer and their own live prices. Advancing
//! replays the next close of every product from the price series into that
//! user's prices and counts down the remaining days. Reaching zero ends the
//! game for good.

use crate::services::analytics::AnalyticsStore;
use crate::services::price_series::PriceSeriesStore;
use crate::services::sqlite_store::SqliteStore;
use crate::services::trading::{validate_user, TradingError};
use crate::types::{DayAdvance, PriceUpdate};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Advances simulation days.
#[derive(Clone)]
pub struct DayClock {
    store: Arc<SqliteStore>,
    prices: Arc<PriceSeriesStore>,
    analytics: Arc<AnalyticsStore>,
}

impl DayClock {
    pub fn new(
        store: Arc<SqliteStore>,
        prices: Arc<PriceSeriesStore>,
        analytics: Arc<AnalyticsStore>,
    ) -> Self {
        Self {
            store,
            prices,
            analytics,
        }
    }

    /// Move a user's game to the next day and reprice every product for them.
    pub fn advance_day(&self, user_id: &str) -> Result<DayAdvance, TradingError> {
        validate_user(user_id)?;

        let writer = self.analytics.snapshot_writer();
        let (advance, holdings) = self.store.with_transaction(|tx| -> Result<_, TradingError> {
            let account = tx
                .account(user_id)?
                .ok_or_else(|| TradingError::AccountNotFound(user_id.to_string()))?;
            if account.game_over {
                return Err(TradingError::GameAlreadyOver);
            }
            if account.remain_days <= 0 {
                return Err(TradingError::NoRemainingDays);
            }

            let day = account.current_day + 1;
            let mut prices = Vec::new();

            for product in tx.user_products(user_id)? {
                let (Some(price), Some(previous_close)) = (
                    self.prices.close_at(&product.code, product.product_type, day),
                    self.prices
                        .previous_close_at(&product.code, product.product_type, day),
                ) else {
                    debug!("No price series for {}, keeping last price", product.code);
                    continue;
                };

                tx.set_user_price(user_id, product.id, price, previous_close)?;

                let change = price - previous_close;
                prices.push(PriceUpdate {
                    product_id: product.id,
                    code: product.code,
                    price,
                    previous_close,
                    change,
                    change_pct: if previous_close > 0.0 {
                        change / previous_close * 100.0
                    } else {
                        0.0
                    },
                });
            }

            let remain_days = account.remain_days - 1;
            let game_over = remain_days == 0;
            tx.update_progress(user_id, day, remain_days, game_over)?;

            let holdings = tx.holdings_snapshot(user_id)?;
            let portfolio_value: f64 = holdings.iter().map(|h| h.current_value).sum();

            Ok((
                DayAdvance {
                    user_id: user_id.to_string(),
                    day,
                    remain_days,
                    max_day: account.max_day,
                    game_over,
                    prices,
                    balance: account.balance,
                    portfolio_value,
                    total_assets: account.balance + portfolio_value,
                },
                holdings,
            ))
        })?;

        info!(
            "Advanced {} to day {} ({} days left)",
            user_id, advance.day, advance.remain_days
        );
        if advance.game_over {
            info!(
                "Game over for {} with total assets {:.2}",
                user_id, advance.total_assets
            );
        }

        if let Err(e) = writer.record(user_id, &holdings, advance.balance, advance.day) {
            warn!("Failed to record day {} for {}: {}", advance.day, user_id, e);
        }

        Ok(advance)
    }
}
