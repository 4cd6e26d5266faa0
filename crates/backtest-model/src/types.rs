// In crates/backtest-model/src/types.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// A single point on the portfolio's equity curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
}

/// A single point on the drawdown series.
///
/// Aligned index-for-index with the equity curve: index `i` of one
/// corresponds to index `i` of the other.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawdownPoint {
    pub timestamp: DateTime<Utc>,
    /// Fractional decline from the running peak equity, clamped to [0, 1].
    pub fraction: f64,
}

/// Net PnL for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPnl {
    pub day: String,
    pub value: Decimal,
}

/// A comprehensive record of a single closed trade, from entry to exit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub symbol: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub quantity: Decimal,
    /// Realized profit/loss including fees.
    pub pnl: Decimal,
    pub fee: Decimal,
    /// Opaque classification tag from the engine (e.g. "long", "short").
    pub kind: String,
}

/// The profit factor as reported by the engine.
///
/// A run with zero gross loss has no meaningful ratio, so that case is
/// tagged explicitly instead of being smuggled through as an infinite float
/// that the display layer could silently misrender.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ProfitFactor {
    Ratio(f64),
    NoLosses,
}

/// The headline metrics shown in the dashboard summary card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub initial_balance: Decimal,
    pub final_equity: Decimal,
    pub total_pnl: Decimal,
    /// Fractional return over the whole run.
    pub total_return: f64,
    pub n_trades: u32,
    /// Percentage in [0, 100].
    pub win_rate: f64,
    pub profit_factor: ProfitFactor,
    /// Max drawdown as a percentage (fraction * 100).
    pub max_drawdown_pct: f64,
}

/// An immutable snapshot of one backtest run, as produced by `ingest`.
///
/// The engine re-runs the whole backtest and publishes a fresh payload each
/// time; a snapshot is replaced wholesale, never patched. All the view
/// methods below are pure reads against the ingested data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub timeframe: String,
    /// Change-detection key: two payloads with the same `updated_at` are the
    /// same snapshot.
    pub updated_at: Option<String>,
    pub initial_balance: Decimal,
    pub final_equity: Decimal,
    pub total_pnl: Decimal,
    pub total_return: f64,
    pub n_trades: u32,
    pub win_rate: f64,
    pub profit_factor: ProfitFactor,
    /// Fraction in [0, 1].
    pub max_drawdown: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub drawdowns: Vec<DrawdownPoint>,
    /// Day key -> net PnL. `BTreeMap` keeps the ISO day keys in
    /// chronological order for display.
    pub daily_pnl: BTreeMap<String, Decimal>,
    /// Chronological entry order, as received from the engine.
    pub trades: Vec<Trade>,
    /// Echo of the strategy parameters the run used, carried opaquely.
    pub params: Option<serde_json::Value>,
    /// Series point pairs dropped during ingestion (bad timestamp or value).
    pub dropped_points: u32,
    /// Trade records dropped during ingestion.
    pub dropped_trades: u32,
}

impl BacktestResult {
    /// The equity curve, ready for plotting.
    pub fn equity_series(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    /// The drawdown series, aligned with `equity_series`.
    pub fn drawdown_series(&self) -> &[DrawdownPoint] {
        &self.drawdowns
    }

    /// Daily PnL as an ordered sequence, day ascending.
    ///
    /// "Recent N days" views are a caller-side slice over this sequence.
    pub fn daily_pnl_series(&self) -> Vec<DailyPnl> {
        self.daily_pnl
            .iter()
            .map(|(day, value)| DailyPnl {
                day: day.clone(),
                value: *value,
            })
            .collect()
    }

    /// The headline metrics for the summary card.
    pub fn summary(&self) -> SummaryStats {
        SummaryStats {
            initial_balance: self.initial_balance,
            final_equity: self.final_equity,
            total_pnl: self.total_pnl,
            total_return: self.total_return,
            n_trades: self.n_trades,
            win_rate: self.win_rate,
            profit_factor: self.profit_factor,
            max_drawdown_pct: self.max_drawdown * 100.0,
        }
    }

    /// Trades in reverse chronological order (most recent entry first), the
    /// display convention. The underlying chronological order is untouched.
    pub fn trades_descending(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().rev()
    }

    /// True when the run produced nothing to display. This is a valid state,
    /// distinct from a malformed payload.
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty() && self.equity_curve.is_empty()
    }

    /// Change detection: the `updated_at` key is the sole signal that a new
    /// result is ready. A payload without the key always counts as new.
    pub fn is_same_snapshot_as(&self, other: &BacktestResult) -> bool {
        matches!(
            (&self.updated_at, &other.updated_at),
            (Some(a), Some(b)) if a == b
        )
    }
}
