//! Analytics Types
//!
//! Realized and unrealized profit records and the total-assets history.

use serde::{Deserialize, Serialize};

/// Input for one realized-profit transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizedSale {
    pub product_id: i64,
    pub product_name: String,
    pub profit: f64,
    pub profit_percentage: f64,
    pub sell_price: f64,
    pub sold_quantity: i64,
    /// Cost basis of the lots consumed by the sale
    pub original_cost: f64,
}

/// One completed sale inside a realized-profit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizedTransaction {
    pub id: String,
    /// When the sale was recorded (ms)
    pub sale_date: i64,
    pub profit: f64,
    pub profit_percentage: f64,
    pub sell_price: f64,
    pub sold_quantity: i64,
    pub original_cost: f64,
}

/// All completed sales of one product by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizedProfitRecord {
    pub product_id: i64,
    pub product_name: String,
    pub transactions: Vec<RealizedTransaction>,
    pub total_profit: f64,
    pub total_original_cost: f64,
    /// Cost-weighted: total profit over total original cost
    pub total_profit_percentage: f64,
}

impl RealizedProfitRecord {
    pub fn new(product_id: i64, product_name: String) -> Self {
        Self {
            product_id,
            product_name,
            transactions: Vec::new(),
            total_profit: 0.0,
            total_original_cost: 0.0,
            total_profit_percentage: 0.0,
        }
    }

    /// Append a sale and recompute the aggregate.
    pub fn push(&mut self, sale: &RealizedSale) {
        self.transactions.push(RealizedTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            sale_date: chrono::Utc::now().timestamp_millis(),
            profit: sale.profit,
            profit_percentage: sale.profit_percentage,
            sell_price: sale.sell_price,
            sold_quantity: sale.sold_quantity,
            original_cost: sale.original_cost,
        });

        self.total_profit = self.transactions.iter().map(|t| t.profit).sum();
        self.total_original_cost = self.transactions.iter().map(|t| t.original_cost).sum();
        self.total_profit_percentage = if self.total_original_cost > 0.0 {
            self.total_profit / self.total_original_cost * 100.0
        } else {
            0.0
        };
    }
}

/// Paper profit on the lots a user still holds in one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnrealizedProfit {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub cost: f64,
    pub current_value: f64,
    pub profit: f64,
    pub profit_percentage: f64,
}

/// Balance and portfolio value recorded for one simulation day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalAssetsRecord {
    pub day: i64,
    pub balance: f64,
    pub portfolio_value: f64,
    pub total_assets: f64,
    /// When the record was written (ms)
    pub recorded_at: i64,
}

/// Profit summary for a user.
///
/// `total_assets_change_percentage` compares the first and last history
/// entries; `realized_profit_percentage` is weighted by cost basis. The two
/// are different measures and are reported side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitSummary {
    pub realized_profit: f64,
    pub unrealized_profit: f64,
    pub total_profit: f64,
    pub realized_profit_percentage: f64,
    pub total_assets_change_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_total_assets: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_total_assets: Option<f64>,
    pub history_len: usize,
}
