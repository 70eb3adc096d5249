//! Historical price series replayed by the day clock.
//!
//! The catalog is a JSON file of products, each with an ordered list of
//! daily closes. It is loaded once at startup and never mutated.

use crate::error::{AppError, Result};
use crate::types::{PricePoint, ProductListing, ProductType};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Catalog file layout.
#[derive(Debug, Deserialize)]
struct PriceCatalog {
    products: Vec<ProductListing>,
}

/// Read-only store of per-product daily closes.
#[derive(Debug, Default)]
pub struct PriceSeriesStore {
    listings: Vec<ProductListing>,
    /// (code, type) -> index into `listings`
    index: HashMap<(String, ProductType), usize>,
}

impl PriceSeriesStore {
    /// Load a catalog from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let store = Self::from_json(&raw)?;
        info!(
            "Loaded price series for {} products from {}",
            store.listings.len(),
            path.as_ref().display()
        );
        Ok(store)
    }

    /// Parse a catalog from JSON text.
    pub fn from_json(raw: &str) -> Result<Self> {
        let catalog: PriceCatalog = serde_json::from_str(raw)?;
        Self::from_listings(catalog.products)
    }

    /// Build a store from listings, sorting each series by date.
    pub fn from_listings(listings: Vec<ProductListing>) -> Result<Self> {
        let mut store = Self::default();

        for mut listing in listings {
            if listing.series.is_empty() {
                return Err(AppError::Catalog(format!(
                    "Empty price series for {} ({})",
                    listing.code, listing.product_type
                )));
            }
            if let Some(bad) = listing
                .series
                .iter()
                .find(|p| !p.close.is_finite() || p.close <= 0.0)
            {
                return Err(AppError::Catalog(format!(
                    "Invalid close {} for {} on {}",
                    bad.close, listing.code, bad.date
                )));
            }

            listing.series.sort_by_key(|p| p.date);

            let key = (listing.code.clone(), listing.product_type);
            if store.index.contains_key(&key) {
                return Err(AppError::Catalog(format!(
                    "Duplicate product {} ({})",
                    listing.code, listing.product_type
                )));
            }
            store.index.insert(key, store.listings.len());
            store.listings.push(listing);
        }

        Ok(store)
    }

    /// All products in catalog order.
    pub fn listings(&self) -> &[ProductListing] {
        &self.listings
    }

    /// Full series for a product.
    pub fn series_for(&self, code: &str, product_type: ProductType) -> Option<&[PricePoint]> {
        self.index
            .get(&(code.to_string(), product_type))
            .map(|&i| self.listings[i].series.as_slice())
    }

    /// Close for a simulation day. Days past the end of the series hold the
    /// last close.
    pub fn close_at(&self, code: &str, product_type: ProductType, day: i64) -> Option<f64> {
        let series = self.series_for(code, product_type)?;
        let idx = (day.max(0) as usize).min(series.len() - 1);
        Some(series[idx].close)
    }

    /// Close of the day before `day`. Day 0 and day 1 report their own close,
    /// so their daily change is zero.
    pub fn previous_close_at(
        &self,
        code: &str,
        product_type: ProductType,
        day: i64,
    ) -> Option<f64> {
        if day <= 1 {
            self.close_at(code, product_type, day)
        } else {
            self.close_at(code, product_type, day - 1)
        }
    }

    /// Points from the start of the series up to and including `day`.
    pub fn history_until(
        &self,
        code: &str,
        product_type: ProductType,
        day: i64,
    ) -> Option<Vec<PricePoint>> {
        let series = self.series_for(code, product_type)?;
        let end = (day.max(0) as usize + 1).min(series.len());
        Some(series[..end].to_vec())
    }
}
