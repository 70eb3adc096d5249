//! Holding ledger: per-user, per-product purchase lots consumed FIFO.
//!
//! Each buy appends one lot; lots are never merged. The lot id is an
//! AUTOINCREMENT key, so ordering by id is acquisition order.

use crate::services::sqlite_store::{holding_from_row, LedgerError, LedgerTx, HOLDING_SELECT};
use crate::types::{ConsumedLot, Holding, HoldingSnapshot};
use rusqlite::params;
use std::collections::BTreeMap;

impl LedgerTx<'_> {
    /// Append a lot. Returns its id.
    pub fn add_lot(
        &self,
        user_id: &str,
        product_id: i64,
        buy_price: f64,
        quantity: i64,
    ) -> Result<i64, LedgerError> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn().execute(
            "INSERT INTO holdings (user_id, product_id, buy_price, quantity, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, product_id, buy_price, quantity, now],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// Lots of one user in one product, oldest first.
    pub fn list_lots_fifo(
        &self,
        user_id: &str,
        product_id: i64,
    ) -> Result<Vec<Holding>, rusqlite::Error> {
        let mut stmt = self.conn().prepare(&format!(
            "{} WHERE user_id = ?1 AND product_id = ?2 ORDER BY id ASC",
            HOLDING_SELECT
        ))?;
        let lots = stmt
            .query_map(params![user_id, product_id], holding_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lots)
    }

    /// Every lot of one user, grouped by product and oldest first.
    pub fn user_lots(&self, user_id: &str) -> Result<Vec<Holding>, rusqlite::Error> {
        let mut stmt = self.conn().prepare(&format!(
            "{} WHERE user_id = ?1 ORDER BY product_id ASC, id ASC",
            HOLDING_SELECT
        ))?;
        let lots = stmt
            .query_map(params![user_id], holding_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lots)
    }

    /// Consume `quantity` units oldest-lot-first.
    ///
    /// Fails with `InsufficientHoldings` before touching any lot when the
    /// user holds fewer than `quantity` units in total.
    pub fn consume_fifo(
        &self,
        user_id: &str,
        product_id: i64,
        quantity: i64,
    ) -> Result<Vec<ConsumedLot>, LedgerError> {
        let lots = self.list_lots_fifo(user_id, product_id)?;
        let held: i64 = lots.iter().map(|l| l.quantity).sum();
        if held < quantity {
            return Err(LedgerError::InsufficientHoldings {
                requested: quantity,
                held,
            });
        }

        let mut remaining = quantity;
        let mut consumed = Vec::new();

        for lot in lots {
            if remaining == 0 {
                break;
            }

            let take = remaining.min(lot.quantity);
            let left = lot.quantity - take;

            if left == 0 {
                self.conn()
                    .execute("DELETE FROM holdings WHERE id = ?1", params![lot.id])?;
            } else {
                self.conn().execute(
                    "UPDATE holdings SET quantity = ?2 WHERE id = ?1",
                    params![lot.id, left],
                )?;
            }

            consumed.push(ConsumedLot {
                lot_id: lot.id,
                consumed_quantity: take,
                buy_price: lot.buy_price,
                remaining_quantity: left,
            });
            remaining -= take;
        }

        Ok(consumed)
    }

    /// Delete every lot of a user. Returns the number removed.
    pub fn delete_user_lots(&self, user_id: &str) -> Result<usize, LedgerError> {
        let removed = self
            .conn()
            .execute("DELETE FROM holdings WHERE user_id = ?1", params![user_id])?;
        Ok(removed)
    }

    /// Open lots of a user grouped per product and valued at the user's live price.
    pub fn holdings_snapshot(&self, user_id: &str) -> Result<Vec<HoldingSnapshot>, rusqlite::Error> {
        let lots = self.user_lots(user_id)?;
        if lots.is_empty() {
            return Ok(Vec::new());
        }

        // product_id -> (quantity, cost, lot count)
        let mut grouped: BTreeMap<i64, (i64, f64, i64)> = BTreeMap::new();
        for lot in &lots {
            let entry = grouped.entry(lot.product_id).or_insert((0, 0.0, 0));
            entry.0 += lot.quantity;
            entry.1 += lot.cost();
            entry.2 += 1;
        }

        let mut snapshots = Vec::with_capacity(grouped.len());
        for (product_id, (quantity, cost, lot_count)) in grouped {
            let product = self
                .user_product(user_id, product_id)?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)?;

            snapshots.push(HoldingSnapshot {
                product_id,
                code: product.code,
                name: product.name,
                product_type: product.product_type,
                quantity,
                lot_count,
                cost,
                current_price: product.current_price,
                current_value: product.current_price * quantity as f64,
            });
        }

        Ok(snapshots)
    }
}
