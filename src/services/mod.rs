pub mod analytics;
pub mod clock;
pub mod holdings;
pub mod inventory;
pub mod price_series;
pub mod sqlite_store;
pub mod trading;

pub use analytics::{
    AnalyticsError, AnalyticsStorage, AnalyticsStore, MemoryAnalyticsStorage, SnapshotWriter,
};
pub use clock::DayClock;
pub use price_series::PriceSeriesStore;
pub use sqlite_store::{LedgerError, LedgerTx, SqliteStore};
pub use trading::{parse_quantity, TradingError, TradingService};
