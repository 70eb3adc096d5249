//! Trade Types
//!
//! Requests and receipts for buys, FIFO sells and day advances.

use crate::types::PriceUpdate;
use serde::{Deserialize, Serialize};

/// Request to buy or sell a product.
///
/// `amount` is kept as raw JSON so a non-numeric quantity is reported as a
/// validation failure instead of a generic body rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub product_id: i64,
    pub user_id: String,
    pub amount: serde_json::Value,
}

/// Result of a committed buy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyReceipt {
    pub lot_id: i64,
    pub product_id: i64,
    pub code: String,
    pub name: String,
    pub quantity: i64,
    /// Price paid per unit
    pub price: f64,
    pub total_cost: f64,
    pub remaining_inventory: i64,
    /// Cash balance after the debit
    pub balance: f64,
}

/// One lot fragment realized by a sell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoldLot {
    pub lot_id: i64,
    pub quantity: i64,
    pub buy_price: f64,
    pub sell_price: f64,
    pub profit: f64,
    pub profit_percentage: f64,
    /// Whether the lot was fully consumed and deleted
    pub closed: bool,
}

/// Aggregate of a FIFO sell across all consumed lots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellSummary {
    pub sold_quantity: i64,
    pub total_buy_value: f64,
    pub total_sell_value: f64,
    pub total_profit: f64,
    pub total_profit_percentage: f64,
}

impl SellSummary {
    /// Fold consumed fragments sold at `sell_price` into a summary.
    pub fn from_lots(lots: &[SoldLot], sell_price: f64) -> Self {
        let sold_quantity: i64 = lots.iter().map(|l| l.quantity).sum();
        let total_buy_value: f64 = lots.iter().map(|l| l.buy_price * l.quantity as f64).sum();
        let total_sell_value = sell_price * sold_quantity as f64;
        let total_profit: f64 = lots.iter().map(|l| l.profit).sum();
        let total_profit_percentage = if total_buy_value > 0.0 {
            total_profit / total_buy_value * 100.0
        } else {
            0.0
        };

        Self {
            sold_quantity,
            total_buy_value,
            total_sell_value,
            total_profit,
            total_profit_percentage,
        }
    }
}

/// Result of a committed FIFO sell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellReceipt {
    pub product_id: i64,
    pub code: String,
    pub name: String,
    pub sell_price: f64,
    pub lots: Vec<SoldLot>,
    pub summary: SellSummary,
    pub remaining_inventory: i64,
    /// Cash balance after the credit
    pub balance: f64,
}

/// Result of advancing a user's simulation by one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAdvance {
    pub user_id: String,
    pub day: i64,
    pub remain_days: i64,
    pub max_day: i64,
    pub game_over: bool,
    pub prices: Vec<PriceUpdate>,
    pub balance: f64,
    pub portfolio_value: f64,
    pub total_assets: f64,
}
