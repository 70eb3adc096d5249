//! Analytics store for realized / unrealized profit and total-assets history.
//!
//! State lives behind an [`AnalyticsStorage`] backend so its lifetime is owned
//! by whoever builds the store. The default backend is an in-memory `DashMap`
//! keyed by user id. Callers treat every failure here as non-fatal.

use crate::types::{
    HoldingSnapshot, ProfitSummary, RealizedProfitRecord, RealizedSale, TotalAssetsRecord,
    UnrealizedProfit,
};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Analytics failures.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Analytics backend unavailable: {0}")]
    Backend(String),
}

/// Storage backend for per-user analytics state.
pub trait AnalyticsStorage: Send + Sync {
    fn load_realized(&self, user_id: &str) -> Result<Vec<RealizedProfitRecord>, AnalyticsError>;
    fn save_realized(
        &self,
        user_id: &str,
        records: Vec<RealizedProfitRecord>,
    ) -> Result<(), AnalyticsError>;

    fn load_unrealized(&self, user_id: &str) -> Result<Vec<UnrealizedProfit>, AnalyticsError>;
    fn save_unrealized(
        &self,
        user_id: &str,
        records: Vec<UnrealizedProfit>,
    ) -> Result<(), AnalyticsError>;

    fn load_history(&self, user_id: &str) -> Result<Vec<TotalAssetsRecord>, AnalyticsError>;
    fn save_history(
        &self,
        user_id: &str,
        records: Vec<TotalAssetsRecord>,
    ) -> Result<(), AnalyticsError>;

    fn clear(&self, user_id: &str) -> Result<(), AnalyticsError>;
}

/// In-memory backend.
#[derive(Default)]
pub struct MemoryAnalyticsStorage {
    realized: DashMap<String, Vec<RealizedProfitRecord>>,
    unrealized: DashMap<String, Vec<UnrealizedProfit>>,
    history: DashMap<String, Vec<TotalAssetsRecord>>,
}

impl MemoryAnalyticsStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnalyticsStorage for MemoryAnalyticsStorage {
    fn load_realized(&self, user_id: &str) -> Result<Vec<RealizedProfitRecord>, AnalyticsError> {
        Ok(self
            .realized
            .get(user_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    fn save_realized(
        &self,
        user_id: &str,
        records: Vec<RealizedProfitRecord>,
    ) -> Result<(), AnalyticsError> {
        self.realized.insert(user_id.to_string(), records);
        Ok(())
    }

    fn load_unrealized(&self, user_id: &str) -> Result<Vec<UnrealizedProfit>, AnalyticsError> {
        Ok(self
            .unrealized
            .get(user_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    fn save_unrealized(
        &self,
        user_id: &str,
        records: Vec<UnrealizedProfit>,
    ) -> Result<(), AnalyticsError> {
        self.unrealized.insert(user_id.to_string(), records);
        Ok(())
    }

    fn load_history(&self, user_id: &str) -> Result<Vec<TotalAssetsRecord>, AnalyticsError> {
        Ok(self
            .history
            .get(user_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    fn save_history(
        &self,
        user_id: &str,
        records: Vec<TotalAssetsRecord>,
    ) -> Result<(), AnalyticsError> {
        self.history.insert(user_id.to_string(), records);
        Ok(())
    }

    fn clear(&self, user_id: &str) -> Result<(), AnalyticsError> {
        self.realized.remove(user_id);
        self.unrealized.remove(user_id);
        self.history.remove(user_id);
        Ok(())
    }
}

/// Derived profit analytics per user.
pub struct AnalyticsStore {
    storage: Arc<dyn AnalyticsStorage>,
    /// Serializes load-modify-save sequences.
    write_lock: Mutex<()>,
    /// Total-assets entries kept per user.
    history_window: usize,
}

impl AnalyticsStore {
    /// Create a store over the given backend.
    pub fn new(storage: Arc<dyn AnalyticsStorage>, history_window: usize) -> Arc<Self> {
        Arc::new(Self {
            storage,
            write_lock: Mutex::new(()),
            history_window: history_window.max(1),
        })
    }

    /// Create a store backed by memory.
    pub fn in_memory(history_window: usize) -> Arc<Self> {
        Self::new(Arc::new(MemoryAnalyticsStorage::new()), history_window)
    }

    /// Append a sale to the user's record for that product.
    pub fn record_realized_profit(
        &self,
        user_id: &str,
        sale: RealizedSale,
    ) -> Result<RealizedProfitRecord, AnalyticsError> {
        let _guard = self.lock_writes();

        let mut records = self.storage.load_realized(user_id)?;
        let idx = match records.iter().position(|r| r.product_id == sale.product_id) {
            Some(idx) => idx,
            None => {
                records.push(RealizedProfitRecord::new(
                    sale.product_id,
                    sale.product_name.clone(),
                ));
                records.len() - 1
            }
        };
        records[idx].push(&sale);
        let record = records[idx].clone();

        self.storage.save_realized(user_id, records)?;

        debug!(
            "Recorded realized profit {:.2} for {} on product {}",
            sale.profit, user_id, sale.product_id
        );
        Ok(record)
    }

    /// Replace the user's unrealized list from live holdings.
    pub fn recompute_unrealized(
        &self,
        user_id: &str,
        holdings: &[HoldingSnapshot],
    ) -> Result<Vec<UnrealizedProfit>, AnalyticsError> {
        let _guard = self.lock_writes();
        self.save_unrealized(user_id, holdings)
    }

    /// Upsert the total-assets record for `day`, keeping the newest entries.
    pub fn record_total_assets(
        &self,
        user_id: &str,
        total_assets: f64,
        balance: f64,
        portfolio_value: f64,
        day: i64,
    ) -> Result<(), AnalyticsError> {
        let _guard = self.lock_writes();
        self.upsert_total_assets(user_id, total_assets, balance, portfolio_value, day)
    }

    /// Take the write lock for a read-then-record sequence.
    ///
    /// Callers read live holdings while holding the writer, so snapshots are
    /// stored in the order they were read.
    pub fn snapshot_writer(&self) -> SnapshotWriter<'_> {
        SnapshotWriter {
            store: self,
            _guard: self.lock_writes(),
        }
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save_unrealized(
        &self,
        user_id: &str,
        holdings: &[HoldingSnapshot],
    ) -> Result<Vec<UnrealizedProfit>, AnalyticsError> {
        let unrealized: Vec<UnrealizedProfit> = holdings
            .iter()
            .map(|h| {
                let profit = h.current_value - h.cost;
                UnrealizedProfit {
                    product_id: h.product_id,
                    product_name: h.name.clone(),
                    quantity: h.quantity,
                    cost: h.cost,
                    current_value: h.current_value,
                    profit,
                    profit_percentage: if h.cost > 0.0 {
                        profit / h.cost * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        self.storage.save_unrealized(user_id, unrealized.clone())?;
        Ok(unrealized)
    }

    fn upsert_total_assets(
        &self,
        user_id: &str,
        total_assets: f64,
        balance: f64,
        portfolio_value: f64,
        day: i64,
    ) -> Result<(), AnalyticsError> {
        let mut history = self.storage.load_history(user_id)?;
        let record = TotalAssetsRecord {
            day,
            balance,
            portfolio_value,
            total_assets,
            recorded_at: chrono::Utc::now().timestamp_millis(),
        };

        match history.iter_mut().find(|r| r.day == day) {
            Some(existing) => *existing = record,
            None => history.push(record),
        }
        history.sort_by_key(|r| r.day);

        if history.len() > self.history_window {
            let excess = history.len() - self.history_window;
            history.drain(..excess);
        }

        self.storage.save_history(user_id, history)
    }

    pub fn realized(&self, user_id: &str) -> Result<Vec<RealizedProfitRecord>, AnalyticsError> {
        self.storage.load_realized(user_id)
    }

    pub fn unrealized(&self, user_id: &str) -> Result<Vec<UnrealizedProfit>, AnalyticsError> {
        self.storage.load_unrealized(user_id)
    }

    pub fn history(&self, user_id: &str) -> Result<Vec<TotalAssetsRecord>, AnalyticsError> {
        self.storage.load_history(user_id)
    }

    /// Realized and unrealized totals plus two percentages.
    ///
    /// `total_assets_change_percentage` is first-vs-last total assets in the
    /// retained history, so it drifts once old entries are evicted.
    pub fn summary(&self, user_id: &str) -> Result<ProfitSummary, AnalyticsError> {
        let realized = self.storage.load_realized(user_id)?;
        let unrealized = self.storage.load_unrealized(user_id)?;
        let history = self.storage.load_history(user_id)?;

        let realized_profit: f64 = realized.iter().map(|r| r.total_profit).sum();
        let realized_cost: f64 = realized.iter().map(|r| r.total_original_cost).sum();
        let unrealized_profit: f64 = unrealized.iter().map(|u| u.profit).sum();

        let first_total_assets = history.first().map(|r| r.total_assets);
        let latest_total_assets = history.last().map(|r| r.total_assets);
        let total_assets_change_percentage = match (first_total_assets, latest_total_assets) {
            (Some(first), Some(last)) if first > 0.0 => (last - first) / first * 100.0,
            _ => 0.0,
        };

        Ok(ProfitSummary {
            realized_profit,
            unrealized_profit,
            total_profit: realized_profit + unrealized_profit,
            realized_profit_percentage: if realized_cost > 0.0 {
                realized_profit / realized_cost * 100.0
            } else {
                0.0
            },
            total_assets_change_percentage,
            first_total_assets,
            latest_total_assets,
            history_len: history.len(),
        })
    }

    /// Wipe all analytics for a user.
    pub fn clear(&self, user_id: &str) -> Result<(), AnalyticsError> {
        let _guard = self.lock_writes();
        self.storage.clear(user_id)?;
        debug!("Cleared analytics for {}", user_id);
        Ok(())
    }
}

/// Exclusive write access to an [`AnalyticsStore`].
pub struct SnapshotWriter<'a> {
    store: &'a AnalyticsStore,
    _guard: MutexGuard<'a, ()>,
}

impl SnapshotWriter<'_> {
    /// Replace unrealized profit and upsert total assets for `day`.
    pub fn record(
        &self,
        user_id: &str,
        holdings: &[HoldingSnapshot],
        balance: f64,
        day: i64,
    ) -> Result<(), AnalyticsError> {
        let portfolio_value: f64 = holdings.iter().map(|h| h.current_value).sum();
        self.store.save_unrealized(user_id, holdings)?;
        self.store
            .upsert_total_assets(user_id, balance + portfolio_value, balance, portfolio_value, day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProductType;

    fn sale(product_id: i64, profit: f64, original_cost: f64) -> RealizedSale {
        RealizedSale {
            product_id,
            product_name: format!("Product {}", product_id),
            profit,
            profit_percentage: profit / original_cost * 100.0,
            sell_price: 0.0,
            sold_quantity: 1,
            original_cost,
        }
    }

    fn snapshot(product_id: i64, quantity: i64, cost: f64, price: f64) -> HoldingSnapshot {
        HoldingSnapshot {
            product_id,
            code: format!("P{}", product_id),
            name: format!("Product {}", product_id),
            product_type: ProductType::Stock,
            quantity,
            lot_count: 1,
            cost,
            current_price: price,
            current_value: price * quantity as f64,
        }
    }

    #[test]
    fn test_realized_weighted_percentage() {
        let store = AnalyticsStore::in_memory(30);

        store.record_realized_profit("alice", sale(1, 100.0, 1000.0)).unwrap();
        let record = store
            .record_realized_profit("alice", sale(1, -50.0, 3000.0))
            .unwrap();

        assert_eq!(record.transactions.len(), 2);
        assert_eq!(record.total_profit, 50.0);
        assert_eq!(record.total_original_cost, 4000.0);
        assert!((record.total_profit_percentage - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_realized_records_per_product() {
        let store = AnalyticsStore::in_memory(30);

        store.record_realized_profit("alice", sale(1, 10.0, 100.0)).unwrap();
        store.record_realized_profit("alice", sale(2, 20.0, 100.0)).unwrap();
        store.record_realized_profit("bob", sale(1, 5.0, 100.0)).unwrap();

        let records = store.realized("alice").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(store.realized("bob").unwrap().len(), 1);
    }

    #[test]
    fn test_unrealized_is_replaced_not_merged() {
        let store = AnalyticsStore::in_memory(30);

        store
            .recompute_unrealized("alice", &[snapshot(1, 10, 1000.0, 110.0), snapshot(2, 1, 5.0, 6.0)])
            .unwrap();
        let unrealized = store
            .recompute_unrealized("alice", &[snapshot(2, 2, 10.0, 4.0)])
            .unwrap();

        assert_eq!(unrealized.len(), 1);
        assert_eq!(unrealized[0].product_id, 2);
        assert_eq!(unrealized[0].profit, -2.0);
        assert_eq!(store.unrealized("alice").unwrap(), unrealized);
    }

    #[test]
    fn test_total_assets_upsert_by_day() {
        let store = AnalyticsStore::in_memory(30);

        store.record_total_assets("alice", 1000.0, 1000.0, 0.0, 0).unwrap();
        store.record_total_assets("alice", 1010.0, 500.0, 510.0, 1).unwrap();
        store.record_total_assets("alice", 1020.0, 500.0, 520.0, 1).unwrap();

        let history = store.history("alice").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].day, 1);
        assert_eq!(history[1].total_assets, 1020.0);
    }

    #[test]
    fn test_total_assets_sorted_and_bounded() {
        let store = AnalyticsStore::in_memory(3);

        for day in [4, 0, 2, 1, 3] {
            store
                .record_total_assets("alice", 100.0 + day as f64, 100.0, day as f64, day)
                .unwrap();
        }

        let history = store.history("alice").unwrap();
        let days: Vec<i64> = history.iter().map(|r| r.day).collect();
        assert_eq!(days, vec![2, 3, 4]);
    }

    #[test]
    fn test_summary_keeps_both_percentages() {
        let store = AnalyticsStore::in_memory(30);

        store.record_total_assets("alice", 1000.0, 1000.0, 0.0, 0).unwrap();
        store.record_total_assets("alice", 1100.0, 900.0, 200.0, 1).unwrap();
        store.record_realized_profit("alice", sale(1, 20.0, 400.0)).unwrap();
        store
            .recompute_unrealized("alice", &[snapshot(2, 10, 150.0, 20.0)])
            .unwrap();

        let summary = store.summary("alice").unwrap();
        assert_eq!(summary.realized_profit, 20.0);
        assert_eq!(summary.unrealized_profit, 50.0);
        assert_eq!(summary.total_profit, 70.0);
        assert!((summary.realized_profit_percentage - 5.0).abs() < 1e-9);
        assert!((summary.total_assets_change_percentage - 10.0).abs() < 1e-9);
        assert_eq!(summary.first_total_assets, Some(1000.0));
        assert_eq!(summary.latest_total_assets, Some(1100.0));
        assert_eq!(summary.history_len, 2);
    }

    #[test]
    fn test_summary_for_unknown_user() {
        let store = AnalyticsStore::in_memory(30);

        let summary = store.summary("nobody").unwrap();
        assert_eq!(summary.total_profit, 0.0);
        assert_eq!(summary.total_assets_change_percentage, 0.0);
        assert_eq!(summary.first_total_assets, None);
    }

    #[test]
    fn test_clear_only_affects_one_user() {
        let store = AnalyticsStore::in_memory(30);

        store.record_realized_profit("alice", sale(1, 10.0, 100.0)).unwrap();
        store.record_total_assets("alice", 1.0, 1.0, 0.0, 0).unwrap();
        store.record_realized_profit("bob", sale(1, 10.0, 100.0)).unwrap();

        store.clear("alice").unwrap();

        assert!(store.realized("alice").unwrap().is_empty());
        assert!(store.history("alice").unwrap().is_empty());
        assert_eq!(store.realized("bob").unwrap().len(), 1);
    }

    #[test]
    fn test_record_snapshot() {
        let store = AnalyticsStore::in_memory(30);

        store
            .snapshot_writer()
            .record("alice", &[snapshot(1, 10, 1000.0, 110.0)], 499_000.0, 1)
            .unwrap();

        let history = store.history("alice").unwrap();
        assert_eq!(history[0].portfolio_value, 1100.0);
        assert_eq!(history[0].total_assets, 500_100.0);
        assert_eq!(store.unrealized("alice").unwrap()[0].profit, 100.0);
    }

    #[test]
    fn test_snapshot_writer_holds_off_other_writes() {
        let store = AnalyticsStore::in_memory(30);
        let writer = store.snapshot_writer();

        let other = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                store.record_total_assets("alice", 2.0, 2.0, 0.0, 1).unwrap();
            })
        };

        writer.record("alice", &[], 1.0, 1).unwrap();
        drop(writer);
        other.join().unwrap();

        // The later write lands last
        let history = store.history("alice").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].total_assets, 2.0);
    }
}
