//! Holding Types
//!
//! Purchase lots and the per-product views derived from them.

use crate::types::ProductType;
use serde::{Deserialize, Serialize};

/// One purchase lot. The id doubles as the FIFO sequence key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub id: i64,
    pub user_id: String,
    pub product_id: i64,
    /// Price paid per unit, fixed at creation
    pub buy_price: f64,
    /// Units left in this lot, always positive
    pub quantity: i64,
    /// When the lot was bought (ms)
    pub created_at: i64,
}

impl Holding {
    pub fn cost(&self) -> f64 {
        self.buy_price * self.quantity as f64
    }
}

/// A fragment of a lot taken by a FIFO sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumedLot {
    pub lot_id: i64,
    pub consumed_quantity: i64,
    pub buy_price: f64,
    /// Units left in the lot afterwards; zero means the lot was deleted
    pub remaining_quantity: i64,
}

/// Live holdings of one user in one product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingSnapshot {
    pub product_id: i64,
    pub code: String,
    pub name: String,
    pub product_type: ProductType,
    pub quantity: i64,
    pub lot_count: i64,
    /// Sum of buy price times quantity over open lots
    pub cost: f64,
    pub current_price: f64,
    pub current_value: f64,
}

impl HoldingSnapshot {
    pub fn average_cost(&self) -> f64 {
        if self.quantity > 0 {
            self.cost / self.quantity as f64
        } else {
            0.0
        }
    }

    pub fn unrealized_profit(&self) -> f64 {
        self.current_value - self.cost
    }
}
