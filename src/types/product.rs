//! Product Types
//!
//! Tradable products and the historical price points they replay.

use serde::{Deserialize, Serialize};

/// Kind of tradable product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Stock,
    Fund,
}

impl ProductType {
    /// Name stored in the `product_type` table.
    pub fn db_name(&self) -> &'static str {
        match self {
            ProductType::Stock => "Stock",
            ProductType::Fund => "Fund",
        }
    }

    /// Parse a `product_type` table name.
    pub fn from_db_name(name: &str) -> Option<Self> {
        match name {
            "Stock" => Some(ProductType::Stock),
            "Fund" => Some(ProductType::Fund),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductType::Stock => write!(f, "stock"),
            ProductType::Fund => write!(f, "fund"),
        }
    }
}

/// One daily close from the historical feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: chrono::NaiveDate,
    pub close: f64,
}

/// A product entry in the price catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListing {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub series: Vec<PricePoint>,
}

/// A product with its live price and remaining inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub product_type: ProductType,
    /// Price at the reading user's day, or the catalog quote without a user
    pub current_price: f64,
    /// Close of the previous simulation day
    pub previous_close: f64,
    /// Units still available to buy
    pub available_quantity: i64,
}

impl Product {
    /// Price change against the previous close.
    pub fn daily_change(&self) -> f64 {
        self.current_price - self.previous_close
    }

    /// Price change against the previous close, in percent.
    pub fn daily_change_pct(&self) -> f64 {
        if self.previous_close > 0.0 {
            self.daily_change() / self.previous_close * 100.0
        } else {
            0.0
        }
    }
}

/// Price written to a product by a day advance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub product_id: i64,
    pub code: String,
    pub price: f64,
    pub previous_close: f64,
    pub change: f64,
    pub change_pct: f64,
}
