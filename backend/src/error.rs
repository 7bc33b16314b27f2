use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid category selector: {0}")]
    InvalidSelector(String),

    #[error("item store unavailable: {0}")]
    ItemStore(String),

    #[error("upstream query timed out: {0}")]
    Timeout(String),

    #[error("price index refresh failed: {0}")]
    PriceRefresh(String),
}
