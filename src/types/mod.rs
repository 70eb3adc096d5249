pub mod account;
pub mod analytics;
pub mod holding;
pub mod portfolio;
pub mod product;
pub mod trade;

pub use account::*;
pub use analytics::*;
pub use holding::*;
pub use portfolio::*;
pub use product::*;
pub use trade::*;
