// In crates/backtest-model/src/lib.rs

pub mod error;
pub mod ingest;
pub mod paginate;
pub mod types;

// Re-export the most important items for easy access from other crates.
pub use error::{Error, Result};
pub use ingest::ingest;
pub use paginate::{Page, paginate};
pub use types::{
    BacktestResult, DailyPnl, DrawdownPoint, EquityPoint, ProfitFactor, SummaryStats, Trade,
};
