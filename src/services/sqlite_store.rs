//! SQLite persistence layer for the trading ledger.
//!
//! Tables:
//! - `product_type`, `product`, `product_price`, `product_quantity`
//! - `user_game_status` (cash balance and day counters)
//! - `user_product_price` (live prices at each user's own day)
//! - `holdings` (FIFO purchase lots)
//!
//! Every mutation runs inside [`SqliteStore::with_transaction`], which holds
//! the connection for the whole check-then-act sequence and commits only when
//! the closure succeeds. Any other exit drops the transaction, rolling it back.

use crate::config::GameConfig;
use crate::types::{Holding, Product, ProductListing, ProductType, UserGameAccount};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

/// Failures raised by ledger operations inside a transaction.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Unknown product: {0}")]
    UnknownProduct(i64),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: f64, available: f64 },

    #[error("Insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory { requested: i64, available: i64 },

    #[error("Insufficient holdings: requested {requested}, held {held}")]
    InsufficientHoldings { requested: i64, held: i64 },

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

/// SQLite store for products, accounts and holdings.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// An open transaction on the ledger database.
///
/// Inventory, balance and holding operations are implemented on this type in
/// `services::inventory` and `services::holdings`.
pub struct LedgerTx<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> LedgerTx<'conn> {
    pub(crate) fn conn(&self) -> &Connection {
        &self.tx
    }

    fn commit(self) -> Result<(), rusqlite::Error> {
        self.tx.commit()
    }
}

pub(crate) const PRODUCT_SELECT: &str = "SELECT p.id, p.code, p.name, t.name, pp.price, pp.previous_close, pq.quantity
     FROM product p
     JOIN product_type t ON t.id = p.type_id
     JOIN product_price pp ON pp.product_id = p.id
     JOIN product_quantity pq ON pq.product_id = p.id";

/// Like [`PRODUCT_SELECT`], priced at one user's day (`?1`). Falls back to the
/// catalog quote for products the user has no price for yet.
pub(crate) const USER_PRODUCT_SELECT: &str = "SELECT p.id, p.code, p.name, t.name,
            COALESCE(up.price, pp.price), COALESCE(up.previous_close, pp.previous_close),
            pq.quantity
     FROM product p
     JOIN product_type t ON t.id = p.type_id
     JOIN product_price pp ON pp.product_id = p.id
     JOIN product_quantity pq ON pq.product_id = p.id
     LEFT JOIN user_product_price up ON up.product_id = p.id AND up.user_id = ?1";

pub(crate) const ACCOUNT_SELECT: &str = "SELECT user_id, balance, initial_balance, remain_days, max_day, current_day,
            game_over, created_at, updated_at
     FROM user_game_status";

pub(crate) const HOLDING_SELECT: &str =
    "SELECT id, user_id, product_id, buy_price, quantity, created_at FROM holdings";

/// Map a row selected with [`PRODUCT_SELECT`] or [`USER_PRODUCT_SELECT`].
pub(crate) fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    let type_name: String = row.get(3)?;
    let product_type = ProductType::from_db_name(&type_name).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown product type {}", type_name).into(),
        )
    })?;

    Ok(Product {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        product_type,
        current_price: row.get(4)?,
        previous_close: row.get(5)?,
        available_quantity: row.get(6)?,
    })
}

/// Map a row selected with [`ACCOUNT_SELECT`].
pub(crate) fn account_from_row(row: &Row<'_>) -> rusqlite::Result<UserGameAccount> {
    Ok(UserGameAccount {
        user_id: row.get(0)?,
        balance: row.get(1)?,
        initial_balance: row.get(2)?,
        remain_days: row.get(3)?,
        max_day: row.get(4)?,
        current_day: row.get(5)?,
        game_over: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Map a row selected with [`HOLDING_SELECT`].
pub(crate) fn holding_from_row(row: &Row<'_>) -> rusqlite::Result<Holding> {
    Ok(Holding {
        id: row.get(0)?,
        user_id: row.get(1)?,
        product_id: row.get(2)?,
        buy_price: row.get(3)?,
        quantity: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Key of a product type in the `product_type` table.
pub(crate) fn type_id(product_type: ProductType) -> i64 {
    match product_type {
        ProductType::Stock => 1,
        ProductType::Fund => 2,
    }
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    /// A panic while holding the lock leaves the transaction rolled back, so
    /// the connection is still consistent and the guard can be recovered.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<(), rusqlite::Error> {
        let conn = self.lock();

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        // Product types
        conn.execute(
            "CREATE TABLE IF NOT EXISTS product_type (
                id INTEGER PRIMARY KEY,
                name TEXT UNIQUE NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO product_type (id, name) VALUES (?1, ?2), (?3, ?4)",
            params![
                type_id(ProductType::Stock),
                ProductType::Stock.db_name(),
                type_id(ProductType::Fund),
                ProductType::Fund.db_name(),
            ],
        )?;

        // Products
        conn.execute(
            "CREATE TABLE IF NOT EXISTS product (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL,
                name TEXT NOT NULL,
                type_id INTEGER NOT NULL REFERENCES product_type(id),
                UNIQUE(code, type_id)
            )",
            [],
        )?;

        // Catalog quote at day zero, written once at seeding
        conn.execute(
            "CREATE TABLE IF NOT EXISTS product_price (
                product_id INTEGER PRIMARY KEY REFERENCES product(id),
                price REAL NOT NULL CHECK (price > 0),
                previous_close REAL NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Live price per user, written by game init and the day clock
        conn.execute(
            "CREATE TABLE IF NOT EXISTS user_product_price (
                user_id TEXT NOT NULL,
                product_id INTEGER NOT NULL REFERENCES product(id),
                price REAL NOT NULL CHECK (price > 0),
                previous_close REAL NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, product_id)
            )",
            [],
        )?;

        // Sellable inventory
        conn.execute(
            "CREATE TABLE IF NOT EXISTS product_quantity (
                product_id INTEGER PRIMARY KEY REFERENCES product(id),
                quantity INTEGER NOT NULL CHECK (quantity >= 0)
            )",
            [],
        )?;

        // Per-user game state
        conn.execute(
            "CREATE TABLE IF NOT EXISTS user_game_status (
                user_id TEXT PRIMARY KEY,
                balance REAL NOT NULL CHECK (balance >= 0),
                initial_balance REAL NOT NULL,
                remain_days INTEGER NOT NULL CHECK (remain_days >= 0),
                max_day INTEGER NOT NULL,
                current_day INTEGER NOT NULL DEFAULT 0,
                game_over INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Purchase lots; AUTOINCREMENT keeps ids strictly increasing and never reused
        conn.execute(
            "CREATE TABLE IF NOT EXISTS holdings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                product_id INTEGER NOT NULL REFERENCES product(id),
                buy_price REAL NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity > 0),
                created_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_holdings_user_product
             ON holdings(user_id, product_id, id)",
            [],
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }

    /// Run `f` inside an IMMEDIATE transaction.
    ///
    /// The write lock is taken at BEGIN, so reads inside `f` cannot go stale
    /// before the writes that depend on them. Commits when `f` returns `Ok`.
    pub fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&LedgerTx<'_>) -> Result<T, E>,
        E: From<rusqlite::Error>,
    {
        let mut conn = self.lock();
        let tx = LedgerTx {
            tx: conn.transaction_with_behavior(TransactionBehavior::Immediate)?,
        };
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run `f` against a read-only snapshot. Nothing is committed.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&LedgerTx<'_>) -> Result<T, E>,
        E: From<rusqlite::Error>,
    {
        let mut conn = self.lock();
        let tx = LedgerTx {
            tx: conn.transaction_with_behavior(TransactionBehavior::Deferred)?,
        };
        f(&tx)
    }

    /// Insert catalog products that are not in the database yet.
    ///
    /// New products start at their first close with the configured initial
    /// inventory. Returns the number of products inserted.
    pub fn seed_products(
        &self,
        listings: &[ProductListing],
        game: &GameConfig,
    ) -> Result<usize, rusqlite::Error> {
        self.with_transaction(|tx| {
            let conn = tx.conn();
            let now = chrono::Utc::now().timestamp_millis();
            let mut inserted = 0;

            for listing in listings {
                let Some(first) = listing.series.first() else {
                    continue;
                };

                let added = conn.execute(
                    "INSERT OR IGNORE INTO product (code, name, type_id) VALUES (?1, ?2, ?3)",
                    params![listing.code, listing.name, type_id(listing.product_type)],
                )?;
                if added == 0 {
                    continue;
                }

                let product_id = conn.last_insert_rowid();
                conn.execute(
                    "INSERT INTO product_price (product_id, price, previous_close, updated_at)
                     VALUES (?1, ?2, ?2, ?3)",
                    params![product_id, first.close, now],
                )?;
                conn.execute(
                    "INSERT INTO product_quantity (product_id, quantity) VALUES (?1, ?2)",
                    params![product_id, game.initial_quantity(listing.product_type)],
                )?;

                debug!("Seeded product {} ({})", listing.code, listing.product_type);
                inserted += 1;
            }

            if inserted > 0 {
                info!("Seeded {} products", inserted);
            }
            Ok(inserted)
        })
    }

    /// Whether a product exists.
    pub fn product_exists(&self, product_id: i64) -> Result<bool, rusqlite::Error> {
        let conn = self.lock();
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM product WHERE id = ?1)",
            params![product_id],
            |row| row.get(0),
        )
    }

    /// Whether a user has a game account.
    pub fn account_exists(&self, user_id: &str) -> Result<bool, rusqlite::Error> {
        let conn = self.lock();
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM user_game_status WHERE user_id = ?1)",
            params![user_id],
            |row| row.get(0),
        )
    }
}
