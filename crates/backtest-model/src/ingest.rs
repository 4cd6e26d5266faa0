// In crates/backtest-model/src/ingest.rs

use crate::error::{Error, Result};
use crate::types::{BacktestResult, DrawdownPoint, EquityPoint, ProfitFactor, Trade};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;

/// Converts one raw result payload from the engine into a typed, immutable
/// snapshot. Pure transformation, no I/O.
///
/// Validation rules:
/// - A missing `equity_curve`, `drawdown_series` or `trades` is an empty
///   sequence, not an error. Absence of results is a displayable state.
/// - A required numeric field that is missing or non-numeric fails with
///   `Error::Malformed`, as does an equity/drawdown length mismatch.
/// - Individual series points or trades that cannot be parsed are dropped
///   and counted, so one bad point degrades the chart instead of blanking it.
pub fn ingest(raw: &Value) -> Result<BacktestResult> {
    let symbol = string_field(raw, "symbol");
    let timeframe = string_field(raw, "timeframe");
    let updated_at = raw
        .get("updated_at")
        .and_then(Value::as_str)
        .map(str::to_owned);

    // --- Required numeric fields ---
    let initial_balance = require_decimal(raw, "initial_balance")?;
    let final_equity = require_decimal(raw, "final_equity")?;
    let total_pnl = require_decimal(raw, "total_pnl")?;
    let n_trades = require_count(raw, "n_trades")?;
    let win_rate = require_f64(raw, "win_rate")?;
    let max_drawdown = require_f64(raw, "max_drawdown")?.clamp(0.0, 1.0);
    let profit_factor = parse_profit_factor(raw)?;

    // Older engine payloads omit `total_return`; derive it when absent.
    let total_return = match optional_f64(raw, "total_return")? {
        Some(r) => r,
        None if initial_balance > Decimal::ZERO => ((final_equity - initial_balance)
            / initial_balance)
            .to_f64()
            .unwrap_or(0.0),
        None => 0.0,
    };

    // --- Series ---
    let raw_equity = sequence_field(raw, "equity_curve")?;
    let raw_drawdown = sequence_field(raw, "drawdown_series")?;
    if raw_equity.len() != raw_drawdown.len() {
        return Err(Error::Malformed(format!(
            "equity_curve has {} points but drawdown_series has {}",
            raw_equity.len(),
            raw_drawdown.len()
        )));
    }

    let mut equity_curve = Vec::with_capacity(raw_equity.len());
    let mut drawdowns = Vec::with_capacity(raw_drawdown.len());
    let mut dropped_points: u32 = 0;
    // The two series are aligned by index, so a bad point on either side
    // drops the whole pair. This keeps the aligned-length invariant intact.
    for (eq, dd) in raw_equity.iter().zip(raw_drawdown.iter()) {
        let eq_ts = point_timestamp(eq);
        let dd_ts = point_timestamp(dd);
        let equity = eq
            .get("equity")
            .and_then(Value::as_f64)
            .and_then(Decimal::from_f64);
        let fraction = dd.get("dd").and_then(Value::as_f64);
        match (eq_ts, dd_ts, equity, fraction) {
            (Some(eq_ts), Some(dd_ts), Some(equity), Some(fraction)) => {
                equity_curve.push(EquityPoint {
                    timestamp: eq_ts,
                    equity,
                });
                drawdowns.push(DrawdownPoint {
                    timestamp: dd_ts,
                    fraction: fraction.clamp(0.0, 1.0),
                });
            }
            _ => dropped_points += 1,
        }
    }
    if dropped_points > 0 {
        tracing::warn!(
            dropped_points,
            "Dropped unparseable point pairs from the backtest series."
        );
    }

    // --- Daily PnL ---
    let mut daily_pnl = BTreeMap::new();
    match raw.get("daily_pnl") {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (day, value) in map {
                match value.as_f64().and_then(Decimal::from_f64) {
                    Some(value) => {
                        daily_pnl.insert(day.clone(), value);
                    }
                    None => tracing::warn!(day = %day, "Dropped non-numeric daily PnL entry."),
                }
            }
        }
        Some(_) => {
            return Err(Error::Malformed("daily_pnl is not an object".into()));
        }
    }

    // --- Trades ---
    let raw_trades = sequence_field(raw, "trades")?;
    let mut trades = Vec::with_capacity(raw_trades.len());
    let mut dropped_trades: u32 = 0;
    for raw_trade in raw_trades {
        match parse_trade(raw_trade) {
            Some(trade) => trades.push(trade),
            None => dropped_trades += 1,
        }
    }
    if dropped_trades > 0 {
        tracing::warn!(dropped_trades, "Dropped unparseable trade records.");
    }

    Ok(BacktestResult {
        symbol,
        timeframe,
        updated_at,
        initial_balance,
        final_equity,
        total_pnl,
        total_return,
        n_trades,
        win_rate,
        profit_factor,
        max_drawdown,
        equity_curve,
        drawdowns,
        daily_pnl,
        trades,
        params: raw.get("params").cloned(),
        dropped_points,
        dropped_trades,
    })
}

/// Parses the timestamps the engine actually emits: RFC 3339, or the
/// `YYYY-MM-DD HH:MM:SS` form that pandas timestamps stringify to.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

fn point_timestamp(point: &Value) -> Option<DateTime<Utc>> {
    point.get("ts").and_then(Value::as_str).and_then(parse_timestamp)
}

fn parse_trade(raw: &Value) -> Option<Trade> {
    Some(Trade {
        symbol: string_field(raw, "symbol"),
        entry_time: raw
            .get("entry_ts")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)?,
        exit_time: raw
            .get("exit_ts")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)?,
        entry_price: trade_decimal(raw, "entry_price")?,
        exit_price: trade_decimal(raw, "exit_price")?,
        quantity: trade_decimal(raw, "qty")?,
        pnl: trade_decimal(raw, "pnl")?,
        fee: trade_decimal(raw, "fee")?,
        kind: string_field(raw, "type"),
    })
}

fn trade_decimal(raw: &Value, key: &str) -> Option<Decimal> {
    raw.get(key).and_then(Value::as_f64).and_then(Decimal::from_f64)
}

fn string_field(raw: &Value, key: &str) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn require_f64(raw: &Value, key: &str) -> Result<f64> {
    raw.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::Malformed(format!("`{key}` is missing or not a number")))
}

fn require_decimal(raw: &Value, key: &str) -> Result<Decimal> {
    require_f64(raw, key).map(|v| Decimal::from_f64(v).unwrap_or_default())
}

fn require_count(raw: &Value, key: &str) -> Result<u32> {
    raw.get(key)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| {
            Error::Malformed(format!("`{key}` is missing or not a non-negative integer"))
        })
}

fn optional_f64(raw: &Value, key: &str) -> Result<Option<f64>> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| Error::Malformed(format!("`{key}` is not a number"))),
    }
}

/// The engine reports `inf` when a run has no losing trades. That sentinel
/// arrives as `null` or a string depending on the serializer, so all of those
/// spellings map to `ProfitFactor::NoLosses`.
fn parse_profit_factor(raw: &Value) -> Result<ProfitFactor> {
    match raw.get("profit_factor") {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.is_finite() => Ok(ProfitFactor::Ratio(f)),
            _ => Ok(ProfitFactor::NoLosses),
        },
        Some(Value::Null) => Ok(ProfitFactor::NoLosses),
        Some(Value::String(s))
            if matches!(s.trim().to_ascii_lowercase().as_str(), "inf" | "infinity" | "+inf") =>
        {
            Ok(ProfitFactor::NoLosses)
        }
        _ => Err(Error::Malformed(
            "`profit_factor` is missing or not a number".into(),
        )),
    }
}

/// Missing or null sequences are valid and mean "no data yet". Anything
/// present but not an array is malformed.
fn sequence_field<'a>(raw: &'a Value, key: &str) -> Result<&'a [Value]> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(Error::Malformed(format!("`{key}` is not an array"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    /// A payload in the exact shape the engine writes, internally consistent:
    /// equity 1000 -> 1050 -> 1020, one winning and one losing long trade,
    /// and a max drawdown of 30 / 1050.
    fn sample_payload() -> Value {
        json!({
            "symbol": "BTC/USDT",
            "timeframe": "1m",
            "updated_at": "2024-01-03 12:00:00",
            "initial_balance": 1000.0,
            "final_equity": 1020.0,
            "total_return": 0.02,
            "total_pnl": 20.0,
            "n_trades": 2,
            "win_rate": 50.0,
            "profit_factor": 1.6667,
            "max_drawdown": 0.0286,
            "equity_curve": [
                {"ts": "2024-01-01 00:00:00", "equity": 1000.0},
                {"ts": "2024-01-02 00:00:00", "equity": 1050.0},
                {"ts": "2024-01-03 00:00:00", "equity": 1020.0}
            ],
            "drawdown_series": [
                {"ts": "2024-01-01 00:00:00", "dd": 0.0},
                {"ts": "2024-01-02 00:00:00", "dd": 0.0},
                {"ts": "2024-01-03 00:00:00", "dd": 0.0286}
            ],
            "daily_pnl": {"2024-01-01": 50.0, "2024-01-02": -30.0},
            "trades": [
                {
                    "entry_ts": "2024-01-01 01:00:00", "exit_ts": "2024-01-01 05:00:00",
                    "symbol": "BTC/USDT", "entry_price": 42000.0, "exit_price": 47090.0,
                    "qty": 0.01, "pnl": 50.0, "fee": 0.9, "type": "long"
                },
                {
                    "entry_ts": "2024-01-02 01:00:00", "exit_ts": "2024-01-02 06:00:00",
                    "symbol": "BTC/USDT", "entry_price": 43000.0, "exit_price": 40090.0,
                    "qty": 0.01, "pnl": -30.0, "fee": 0.9, "type": "long"
                }
            ],
            "params": {"ema_fast": 8, "ema_slow": 21, "rsi_period": 14}
        })
    }

    #[test]
    fn series_stay_aligned() {
        let result = ingest(&sample_payload()).unwrap();
        assert_eq!(result.equity_series().len(), 3);
        assert_eq!(result.equity_series().len(), result.drawdown_series().len());
        assert_eq!(result.dropped_points, 0);
    }

    #[test]
    fn ingest_is_idempotent() {
        let raw = sample_payload();
        let first = ingest(&raw).unwrap();
        let second = ingest(&raw).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn summary_matches_last_equity_point() {
        let result = ingest(&sample_payload()).unwrap();
        let last = result.equity_series().last().unwrap();
        assert_eq!(result.summary().final_equity, last.equity);
    }

    #[test]
    fn summary_scales_drawdown_to_percent() {
        let result = ingest(&sample_payload()).unwrap();
        assert!((result.summary().max_drawdown_pct - 2.86).abs() < 1e-9);
    }

    #[test]
    fn total_pnl_is_final_minus_initial() {
        let result = ingest(&sample_payload()).unwrap();
        assert_eq!(
            result.total_pnl,
            result.final_equity - result.initial_balance
        );
    }

    #[test]
    fn sample_trades_obey_the_pnl_identity() {
        // pnl == (exit - entry) * qty - fee for long trades. The model trusts
        // the engine here; this checks the fixture itself is coherent.
        let result = ingest(&sample_payload()).unwrap();
        for trade in &result.trades {
            assert_eq!(trade.kind, "long");
            let expected = (trade.exit_price - trade.entry_price) * trade.quantity - trade.fee;
            assert_eq!(trade.pnl, expected);
        }
    }

    #[test]
    fn missing_trades_is_an_empty_view_not_an_error() {
        let mut raw = sample_payload();
        raw.as_object_mut().unwrap().remove("trades");
        let result = ingest(&raw).unwrap();
        assert_eq!(result.trades_descending().count(), 0);
    }

    #[test]
    fn missing_series_ingest_as_empty() {
        let mut raw = sample_payload();
        let map = raw.as_object_mut().unwrap();
        map.remove("equity_curve");
        map.remove("drawdown_series");
        map.remove("daily_pnl");
        let result = ingest(&raw).unwrap();
        assert!(result.equity_series().is_empty());
        assert!(result.drawdown_series().is_empty());
        assert!(result.daily_pnl_series().is_empty());
    }

    #[test]
    fn series_length_mismatch_is_malformed() {
        let mut raw = sample_payload();
        raw["drawdown_series"].as_array_mut().unwrap().pop();
        assert!(matches!(ingest(&raw), Err(Error::Malformed(_))));
    }

    #[test]
    fn non_numeric_required_field_is_malformed() {
        let mut raw = sample_payload();
        raw["final_equity"] = json!("not-a-number");
        assert!(matches!(ingest(&raw), Err(Error::Malformed(_))));
    }

    #[test]
    fn bad_timestamp_drops_the_pair_not_the_payload() {
        let mut raw = sample_payload();
        raw["equity_curve"][1]["ts"] = json!("garbage");
        let result = ingest(&raw).unwrap();
        assert_eq!(result.dropped_points, 1);
        assert_eq!(result.equity_series().len(), 2);
        assert_eq!(result.equity_series().len(), result.drawdown_series().len());
    }

    #[test]
    fn drawdown_fractions_are_clamped() {
        let mut raw = sample_payload();
        raw["drawdown_series"][0]["dd"] = json!(-0.5);
        raw["drawdown_series"][2]["dd"] = json!(1.8);
        let result = ingest(&raw).unwrap();
        assert_eq!(result.drawdown_series()[0].fraction, 0.0);
        assert_eq!(result.drawdown_series()[2].fraction, 1.0);
    }

    #[test]
    fn profit_factor_sentinel_forms_map_to_no_losses() {
        for sentinel in [json!(null), json!("inf"), json!("Infinity")] {
            let mut raw = sample_payload();
            raw["profit_factor"] = sentinel;
            let result = ingest(&raw).unwrap();
            assert_eq!(result.profit_factor, ProfitFactor::NoLosses);
        }
    }

    #[test]
    fn daily_pnl_series_is_chronological() {
        let raw = json!({
            "symbol": "BTC/USDT", "timeframe": "1m",
            "initial_balance": 1000.0, "final_equity": 1030.0, "total_pnl": 30.0,
            "n_trades": 0, "win_rate": 0.0, "profit_factor": 0.0, "max_drawdown": 0.0,
            // Deliberately out of order in the source object.
            "daily_pnl": {"2024-01-02": -20.0, "2024-01-01": 50.0}
        });
        let series = ingest(&raw).unwrap().daily_pnl_series();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].day, "2024-01-01");
        assert_eq!(series[0].value, dec!(50));
        assert_eq!(series[1].day, "2024-01-02");
        assert_eq!(series[1].value, dec!(-20));
    }

    #[test]
    fn trades_descending_reverses_entry_order() {
        let result = ingest(&sample_payload()).unwrap();
        let descending: Vec<&Trade> = result.trades_descending().collect();
        let mut expected: Vec<&Trade> = result.trades.iter().collect();
        expected.reverse();
        assert_eq!(descending, expected);
        assert!(descending[0].entry_time > descending[1].entry_time);
    }

    #[test]
    fn unparseable_trade_is_dropped_with_a_count() {
        let mut raw = sample_payload();
        raw["trades"][0]["entry_ts"] = json!(12345);
        let result = ingest(&raw).unwrap();
        assert_eq!(result.dropped_trades, 1);
        assert_eq!(result.trades.len(), 1);
    }

    #[test]
    fn total_return_is_derived_when_absent() {
        let mut raw = sample_payload();
        raw.as_object_mut().unwrap().remove("total_return");
        let result = ingest(&raw).unwrap();
        assert!((result.total_return - 0.02).abs() < 1e-9);
    }

    #[test]
    fn rfc3339_timestamps_parse_too() {
        let mut raw = sample_payload();
        raw["equity_curve"][0]["ts"] = json!("2024-01-01T00:00:00Z");
        raw["drawdown_series"][0]["ts"] = json!("2024-01-01T00:00:00+00:00");
        let result = ingest(&raw).unwrap();
        assert_eq!(result.dropped_points, 0);
        assert_eq!(
            result.equity_series()[0].timestamp,
            result.drawdown_series()[0].timestamp
        );
    }

    #[test]
    fn change_detection_uses_updated_at() {
        let raw = sample_payload();
        let first = ingest(&raw).unwrap();
        let second = ingest(&raw).unwrap();
        assert!(first.is_same_snapshot_as(&second));

        let mut changed = sample_payload();
        changed["updated_at"] = json!("2024-01-04 09:00:00");
        let third = ingest(&changed).unwrap();
        assert!(!first.is_same_snapshot_as(&third));

        let mut missing = sample_payload();
        missing.as_object_mut().unwrap().remove("updated_at");
        let fourth = ingest(&missing).unwrap();
        // Without the key a payload always counts as new.
        assert!(!fourth.is_same_snapshot_as(&fourth.clone()));
    }

    #[test]
    fn empty_run_is_classified_as_empty() {
        let raw = json!({
            "symbol": "BTC/USDT", "timeframe": "1m",
            "initial_balance": 1000.0, "final_equity": 1000.0, "total_pnl": 0.0,
            "n_trades": 0, "win_rate": 0.0, "profit_factor": null, "max_drawdown": 0.0
        });
        let result = ingest(&raw).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.summary().final_equity, result.initial_balance);
    }
}
