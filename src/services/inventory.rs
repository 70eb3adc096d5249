//! Inventory & balance operations.
//!
//! Debits and inventory decrements are single conditional `UPDATE`s, so the
//! sufficiency check and the write cannot be split by another writer even
//! before the enclosing transaction commits.

use crate::services::sqlite_store::{
    account_from_row, product_from_row, LedgerError, LedgerTx, ACCOUNT_SELECT, PRODUCT_SELECT,
    USER_PRODUCT_SELECT,
};
use crate::types::{Product, ProductType, UserGameAccount};
use rusqlite::{params, OptionalExtension};

impl LedgerTx<'_> {
    /// Get a product with its live price and inventory.
    pub fn product(&self, product_id: i64) -> Result<Option<Product>, rusqlite::Error> {
        self.conn()
            .query_row(
                &format!("{} WHERE p.id = ?1", PRODUCT_SELECT),
                params![product_id],
                product_from_row,
            )
            .optional()
    }

    /// Get every product, ordered by id.
    pub fn products(&self) -> Result<Vec<Product>, rusqlite::Error> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{} ORDER BY p.id", PRODUCT_SELECT))?;
        let products = stmt
            .query_map([], product_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    /// Get a user's game account.
    pub fn account(&self, user_id: &str) -> Result<Option<UserGameAccount>, rusqlite::Error> {
        self.conn()
            .query_row(
                &format!("{} WHERE user_id = ?1", ACCOUNT_SELECT),
                params![user_id],
                account_from_row,
            )
            .optional()
    }

    /// Get a product priced at the user's own day.
    pub fn user_product(
        &self,
        user_id: &str,
        product_id: i64,
    ) -> Result<Option<Product>, rusqlite::Error> {
        self.conn()
            .query_row(
                &format!("{} WHERE p.id = ?2", USER_PRODUCT_SELECT),
                params![user_id, product_id],
                product_from_row,
            )
            .optional()
    }

    /// Get every product priced at the user's own day, ordered by id.
    pub fn user_products(&self, user_id: &str) -> Result<Vec<Product>, rusqlite::Error> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{} ORDER BY p.id", USER_PRODUCT_SELECT))?;
        let products = stmt
            .query_map(params![user_id], product_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    /// Debit `amount` from a user's balance if it covers it.
    ///
    /// Returns the new balance.
    pub fn reserve_and_debit(&self, user_id: &str, amount: f64) -> Result<f64, LedgerError> {
        let now = chrono::Utc::now().timestamp_millis();
        let changed = self.conn().execute(
            "UPDATE user_game_status
             SET balance = balance - ?2, updated_at = ?3
             WHERE user_id = ?1 AND balance >= ?2",
            params![user_id, amount, now],
        )?;

        let account = self
            .account(user_id)?
            .ok_or_else(|| LedgerError::UnknownAccount(user_id.to_string()))?;

        if changed == 0 {
            return Err(LedgerError::InsufficientFunds {
                needed: amount,
                available: account.balance,
            });
        }
        Ok(account.balance)
    }

    /// Take `quantity` units out of a product's inventory if available.
    ///
    /// Returns the remaining inventory.
    pub fn reserve_and_decrement_inventory(
        &self,
        product_id: i64,
        quantity: i64,
    ) -> Result<i64, LedgerError> {
        let changed = self.conn().execute(
            "UPDATE product_quantity SET quantity = quantity - ?2
             WHERE product_id = ?1 AND quantity >= ?2",
            params![product_id, quantity],
        )?;

        let available = self.inventory(product_id)?;

        if changed == 0 {
            return Err(LedgerError::InsufficientInventory {
                requested: quantity,
                available,
            });
        }
        Ok(available)
    }

    /// Add `amount` to a user's balance. Returns the new balance.
    pub fn credit(&self, user_id: &str, amount: f64) -> Result<f64, LedgerError> {
        let now = chrono::Utc::now().timestamp_millis();
        let changed = self.conn().execute(
            "UPDATE user_game_status SET balance = balance + ?2, updated_at = ?3
             WHERE user_id = ?1",
            params![user_id, amount, now],
        )?;
        if changed == 0 {
            return Err(LedgerError::UnknownAccount(user_id.to_string()));
        }

        let balance = self.conn().query_row(
            "SELECT balance FROM user_game_status WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(balance)
    }

    /// Return `quantity` units to a product's inventory. Returns the new inventory.
    pub fn increment_inventory(&self, product_id: i64, quantity: i64) -> Result<i64, LedgerError> {
        let changed = self.conn().execute(
            "UPDATE product_quantity SET quantity = quantity + ?2 WHERE product_id = ?1",
            params![product_id, quantity],
        )?;
        if changed == 0 {
            return Err(LedgerError::UnknownProduct(product_id));
        }
        self.inventory(product_id)
    }

    fn inventory(&self, product_id: i64) -> Result<i64, LedgerError> {
        self.conn()
            .query_row(
                "SELECT quantity FROM product_quantity WHERE product_id = ?1",
                params![product_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(LedgerError::UnknownProduct(product_id))
    }

    /// Write a user's live price for a product.
    pub fn set_user_price(
        &self,
        user_id: &str,
        product_id: i64,
        price: f64,
        previous_close: f64,
    ) -> Result<(), LedgerError> {
        let now = chrono::Utc::now().timestamp_millis();
        let changed = self.conn().execute(
            "INSERT INTO user_product_price (user_id, product_id, price, previous_close, updated_at)
             SELECT ?1, id, ?3, ?4, ?5 FROM product WHERE id = ?2
             ON CONFLICT (user_id, product_id)
             DO UPDATE SET price = ?3, previous_close = ?4, updated_at = ?5",
            params![user_id, product_id, price, previous_close, now],
        )?;
        if changed == 0 {
            return Err(LedgerError::UnknownProduct(product_id));
        }
        Ok(())
    }

    /// Delete a user's live prices. Returns the number removed.
    pub fn delete_user_prices(&self, user_id: &str) -> Result<usize, LedgerError> {
        let removed = self.conn().execute(
            "DELETE FROM user_product_price WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(removed)
    }

    /// Create a game account.
    pub fn insert_account(&self, account: &UserGameAccount) -> Result<(), LedgerError> {
        self.conn().execute(
            "INSERT INTO user_game_status
             (user_id, balance, initial_balance, remain_days, max_day, current_day,
              game_over, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                account.user_id,
                account.balance,
                account.initial_balance,
                account.remain_days,
                account.max_day,
                account.current_day,
                account.game_over as i64,
                account.created_at,
                account.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Store a user's day pointer, remaining days and game-over flag.
    pub fn update_progress(
        &self,
        user_id: &str,
        current_day: i64,
        remain_days: i64,
        game_over: bool,
    ) -> Result<(), LedgerError> {
        let now = chrono::Utc::now().timestamp_millis();
        let changed = self.conn().execute(
            "UPDATE user_game_status
             SET current_day = ?2, remain_days = ?3, game_over = ?4, updated_at = ?5
             WHERE user_id = ?1",
            params![user_id, current_day, remain_days, game_over as i64, now],
        )?;
        if changed == 0 {
            return Err(LedgerError::UnknownAccount(user_id.to_string()));
        }
        Ok(())
    }

    /// Delete a user's game account. Returns whether one existed.
    pub fn delete_account(&self, user_id: &str) -> Result<bool, LedgerError> {
        let changed = self.conn().execute(
            "DELETE FROM user_game_status WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(changed > 0)
    }

    /// Reset every product's inventory to the constant for its type.
    ///
    /// Returns the number of products reset.
    pub fn reset_inventories(
        &self,
        stock_quantity: i64,
        fund_quantity: i64,
    ) -> Result<usize, LedgerError> {
        let changed = self.conn().execute(
            "UPDATE product_quantity SET quantity = CASE
                (SELECT t.name FROM product p JOIN product_type t ON t.id = p.type_id
                 WHERE p.id = product_quantity.product_id)
                WHEN ?1 THEN ?2
                WHEN ?3 THEN ?4
                ELSE quantity
             END",
            params![
                ProductType::Stock.db_name(),
                stock_quantity,
                ProductType::Fund.db_name(),
                fund_quantity,
            ],
        )?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::GameConfig;
    use crate::services::price_series::PriceSeriesStore;
    use crate::services::sqlite_store::{LedgerError, SqliteStore};
    use crate::types::UserGameAccount;

    const CATALOG: &str = r#"{
        "products": [
            {"code": "ACME", "name": "Acme Corp", "type": "stock",
             "series": [{"date": "2024-01-02", "close": 100.0}]},
            {"code": "IDX", "name": "Index Fund", "type": "fund",
             "series": [{"date": "2024-01-02", "close": 10.0}]}
        ]
    }"#;

    fn store_with_account(balance: f64) -> SqliteStore {
        let store = SqliteStore::new_in_memory().unwrap();
        let prices = PriceSeriesStore::from_json(CATALOG).unwrap();
        store
            .seed_products(prices.listings(), &GameConfig::default())
            .unwrap();
        let account = UserGameAccount::new("alice".to_string(), balance, 30);
        store
            .with_transaction(|tx| tx.insert_account(&account))
            .unwrap();
        store
    }

    #[test]
    fn test_debit_within_balance() {
        let store = store_with_account(1000.0);

        let balance = store
            .with_transaction(|tx| tx.reserve_and_debit("alice", 400.0))
            .unwrap();
        assert_eq!(balance, 600.0);
    }

    #[test]
    fn test_debit_exact_balance() {
        let store = store_with_account(1000.0);

        let balance = store
            .with_transaction(|tx| tx.reserve_and_debit("alice", 1000.0))
            .unwrap();
        assert_eq!(balance, 0.0);
    }

    #[test]
    fn test_debit_rejects_overdraft() {
        let store = store_with_account(1000.0);

        let result = store.with_transaction(|tx| tx.reserve_and_debit("alice", 1000.5));
        match result {
            Err(LedgerError::InsufficientFunds { needed, available }) => {
                assert_eq!(needed, 1000.5);
                assert_eq!(available, 1000.0);
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }

        let account = store
            .read(|tx| tx.account("alice"))
            .unwrap()
            .unwrap();
        assert_eq!(account.balance, 1000.0);
    }

    #[test]
    fn test_debit_unknown_account() {
        let store = store_with_account(1000.0);

        let result = store.with_transaction(|tx| tx.reserve_and_debit("bob", 1.0));
        assert!(matches!(result, Err(LedgerError::UnknownAccount(_))));
    }

    #[test]
    fn test_decrement_inventory() {
        let store = store_with_account(1000.0);

        let remaining = store
            .with_transaction(|tx| tx.reserve_and_decrement_inventory(1, 250))
            .unwrap();
        assert_eq!(remaining, 750);

        let result = store.with_transaction(|tx| tx.reserve_and_decrement_inventory(1, 751));
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientInventory {
                requested: 751,
                available: 750
            })
        ));
    }

    #[test]
    fn test_credit_and_increment() {
        let store = store_with_account(1000.0);

        let (balance, inventory) = store
            .with_transaction(|tx| -> Result<_, LedgerError> {
                let balance = tx.credit("alice", 250.0)?;
                let inventory = tx.increment_inventory(2, 5)?;
                Ok((balance, inventory))
            })
            .unwrap();

        assert_eq!(balance, 1250.0);
        assert_eq!(inventory, 2005);
    }

    #[test]
    fn test_increment_unknown_product() {
        let store = store_with_account(1000.0);

        let result = store.with_transaction(|tx| tx.increment_inventory(99, 5));
        assert!(matches!(result, Err(LedgerError::UnknownProduct(99))));
    }

    #[test]
    fn test_reset_inventories_by_type() {
        let store = store_with_account(1000.0);

        store
            .with_transaction(|tx| -> Result<_, LedgerError> {
                tx.reserve_and_decrement_inventory(1, 10)?;
                tx.reserve_and_decrement_inventory(2, 20)?;
                tx.reset_inventories(1000, 2000)
            })
            .unwrap();

        let products = store.read(|tx| tx.products()).unwrap();
        assert_eq!(products[0].available_quantity, 1000);
        assert_eq!(products[1].available_quantity, 2000);
    }

    #[test]
    fn test_user_price_and_daily_change() {
        let store = store_with_account(1000.0);

        store
            .with_transaction(|tx| tx.set_user_price("alice", 1, 110.0, 100.0))
            .unwrap();

        let product = store.read(|tx| tx.user_product("alice", 1)).unwrap().unwrap();
        assert_eq!(product.current_price, 110.0);
        assert_eq!(product.daily_change(), 10.0);
        assert!((product.daily_change_pct() - 10.0).abs() < 1e-9);

        // Overwrites in place
        store
            .with_transaction(|tx| tx.set_user_price("alice", 1, 120.0, 110.0))
            .unwrap();
        let product = store.read(|tx| tx.user_product("alice", 1)).unwrap().unwrap();
        assert_eq!(product.current_price, 120.0);
        assert_eq!(product.previous_close, 110.0);
    }

    #[test]
    fn test_user_prices_are_isolated() {
        let store = store_with_account(1000.0);

        store
            .with_transaction(|tx| tx.set_user_price("alice", 1, 110.0, 100.0))
            .unwrap();

        // Other users and the catalog quote keep the seeded price
        let bob = store.read(|tx| tx.user_products("bob")).unwrap();
        assert_eq!(bob[0].current_price, 100.0);
        let catalog = store.read(|tx| tx.product(1)).unwrap().unwrap();
        assert_eq!(catalog.current_price, 100.0);

        let removed = store
            .with_transaction(|tx| tx.delete_user_prices("alice"))
            .unwrap();
        assert_eq!(removed, 1);
        let alice = store.read(|tx| tx.user_product("alice", 1)).unwrap().unwrap();
        assert_eq!(alice.current_price, 100.0);
    }

    #[test]
    fn test_user_price_unknown_product() {
        let store = store_with_account(1000.0);

        let result = store.with_transaction(|tx| tx.set_user_price("alice", 99, 1.0, 1.0));
        assert!(matches!(result, Err(LedgerError::UnknownProduct(99))));
    }

    #[test]
    fn test_update_progress_and_delete() {
        let store = store_with_account(1000.0);

        store
            .with_transaction(|tx| tx.update_progress("alice", 3, 27, false))
            .unwrap();
        let account = store.read(|tx| tx.account("alice")).unwrap().unwrap();
        assert_eq!(account.current_day, 3);
        assert_eq!(account.remain_days, 27);

        assert!(store.with_transaction(|tx| tx.delete_account("alice")).unwrap());
        assert!(!store.with_transaction(|tx| tx.delete_account("alice")).unwrap());
    }
}
