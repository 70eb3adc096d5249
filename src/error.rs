use thiserror::Error;

/// Errors raised while loading data at startup.
///
/// Request-time failures use `TradingError` instead.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid price catalog: {0}")]
    Catalog(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
