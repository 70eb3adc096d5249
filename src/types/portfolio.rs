//! Read-only projections served to the game client.

use crate::types::{
    HoldingSnapshot, PricePoint, ProfitSummary, RealizedProfitRecord, UnrealizedProfit,
};
use serde::{Deserialize, Serialize};

/// One product position in the portfolio view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioHolding {
    #[serde(flatten)]
    pub snapshot: HoldingSnapshot,
    pub average_cost: f64,
    pub unrealized_profit: f64,
    pub unrealized_profit_pct: f64,
}

impl From<HoldingSnapshot> for PortfolioHolding {
    fn from(snapshot: HoldingSnapshot) -> Self {
        let average_cost = snapshot.average_cost();
        let unrealized_profit = snapshot.unrealized_profit();
        let unrealized_profit_pct = if snapshot.cost > 0.0 {
            unrealized_profit / snapshot.cost * 100.0
        } else {
            0.0
        };
        Self {
            snapshot,
            average_cost,
            unrealized_profit,
            unrealized_profit_pct,
        }
    }
}

/// Cash, holdings and totals for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioView {
    pub user_id: String,
    pub current_day: i64,
    pub balance: f64,
    pub portfolio_value: f64,
    pub total_assets: f64,
    pub initial_balance: f64,
    /// Total assets against the starting balance
    pub total_return_pct: f64,
    pub holdings: Vec<PortfolioHolding>,
}

/// Realized and unrealized performance for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub user_id: String,
    pub summary: ProfitSummary,
    pub realized: Vec<RealizedProfitRecord>,
    pub unrealized: Vec<UnrealizedProfit>,
}

/// Profit attributed to one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub product_id: i64,
    pub product_name: String,
    pub realized_profit: f64,
    pub unrealized_profit: f64,
    pub total_profit: f64,
    /// Share of the summed absolute profit across all products
    pub contribution_pct: f64,
}

/// Closes of one product up to a user's current day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductHistory {
    pub product_id: i64,
    pub code: String,
    pub name: String,
    pub current_day: i64,
    pub points: Vec<PricePoint>,
}
