// In crates/backtest-model/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A required field in the payload is missing or has the wrong type,
    /// or the equity curve and drawdown series do not line up.
    #[error("Malformed backtest payload: {0}")]
    Malformed(String),

    /// A pagination request outside the valid page range.
    #[error("Page {page} is out of range (valid pages are 1..={total_pages})")]
    OutOfRange { page: usize, total_pages: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
