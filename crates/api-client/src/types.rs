// In crates/api-client/src/types.rs

use reqwest::Client;
use serde::Serialize;

/// The client for the backtest engine's HTTP API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// The persistent HTTP client.
    pub http_client: Client,
    /// The base URL of the backtest engine.
    pub base_url: String,
}

/// The strategy parameters sent with `POST /backtest/run`.
///
/// Serialized straight into the query string, so field names here must match
/// the query parameter names the engine expects.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestParams {
    /// The instrument to test (e.g., "BTC/USDT").
    pub symbol: String,
    /// The candle interval (e.g., "1m", "1h").
    pub timeframe: String,
    pub ema_fast: u32,
    pub ema_slow: u32,
    pub rsi_period: u32,
    /// Stop-loss distance in percent.
    pub sl_pct: f64,
    /// Take-profit distance in percent.
    pub tp_pct: f64,
    /// Position size as a percent of the balance.
    pub size_pct: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_serialize_to_the_engine_query_string() {
        let params = BacktestParams {
            symbol: "BTC/USDT".into(),
            timeframe: "1m".into(),
            ema_fast: 8,
            ema_slow: 21,
            rsi_period: 14,
            sl_pct: 0.6,
            tp_pct: 1.2,
            size_pct: 25.0,
        };
        let query = serde_urlencoded::to_string(&params).unwrap();
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(&query).unwrap();
        let get = |key: &str| -> &str {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        // The slash in the symbol must survive the round trip percent-encoded.
        assert!(query.contains("symbol=BTC%2FUSDT"));
        assert_eq!(get("symbol"), "BTC/USDT");
        assert_eq!(get("timeframe"), "1m");
        assert_eq!(get("ema_fast"), "8");
        assert_eq!(get("ema_slow"), "21");
        assert_eq!(get("rsi_period"), "14");
        assert_eq!(get("sl_pct").parse::<f64>().unwrap(), 0.6);
        assert_eq!(get("tp_pct").parse::<f64>().unwrap(), 1.2);
        assert_eq!(get("size_pct").parse::<f64>().unwrap(), 25.0);
    }
}
