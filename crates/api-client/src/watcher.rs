// In crates/api-client/src/watcher.rs

use crate::Result;
use crate::types::ApiClient;
use backtest_model::BacktestResult;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::{Duration, MissedTickBehavior, interval};

/// Polls the engine for new backtest results and broadcasts fresh snapshots.
///
/// The engine re-runs the whole backtest and replaces the payload wholesale,
/// so the watcher only has to compare the `updated_at` key to know whether
/// anything changed. Only one request is ever in flight: each tick awaits
/// the previous fetch before the next can start.
pub struct ResultsWatcher {
    client: ApiClient,
    poll_interval: Duration,
    last_updated: Option<String>,
    snapshot_tx: broadcast::Sender<BacktestResult>,
}

impl ResultsWatcher {
    pub fn new(client: ApiClient, poll_interval: Duration) -> Self {
        let (snapshot_tx, _) = broadcast::channel(16);
        Self {
            client,
            poll_interval,
            last_updated: None,
            snapshot_tx,
        }
    }

    /// Returns a receiver for freshly ingested snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<BacktestResult> {
        self.snapshot_tx.subscribe()
    }

    /// The main, long-running poll loop. A failed poll is logged and the
    /// loop carries on; one bad response must not kill the watcher.
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!(
            base_url = %self.client.base_url,
            interval_secs = self.poll_interval.as_secs(),
            "Starting backtest results watcher."
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.poll_once().await {
                tracing::warn!(error = %e, "Polling the backtest engine failed.");
            }
        }
    }

    /// One poll cycle: fetch, change-detect on `updated_at`, ingest,
    /// broadcast. Returns `true` when a new snapshot was published.
    pub async fn poll_once(&mut self) -> Result<bool> {
        let Some(raw) = self.client.fetch_results().await? else {
            return Ok(false);
        };

        // Two payloads with the same `updated_at` are the same snapshot;
        // re-ingesting one would be a pointless no-op for every subscriber.
        let updated_at = snapshot_key(&raw);
        if updated_at.is_some() && updated_at == self.last_updated {
            return Ok(false);
        }

        match backtest_model::ingest(&raw) {
            Ok(snapshot) => {
                self.last_updated = updated_at;
                tracing::info!(
                    symbol = %snapshot.symbol,
                    timeframe = %snapshot.timeframe,
                    trades = snapshot.trades.len(),
                    "New backtest snapshot received."
                );
                // Send fails only when nobody is subscribed; that is fine.
                let _ = self.snapshot_tx.send(snapshot);
                Ok(true)
            }
            Err(e) => {
                // Do not advance `last_updated`: the engine may rewrite the
                // file mid-read, and the next poll should retry it.
                tracing::warn!(error = %e, "Discarding malformed backtest payload.");
                Ok(false)
            }
        }
    }
}

/// The change-detection key of a raw payload.
pub fn snapshot_key(raw: &Value) -> Option<String> {
    raw.get("updated_at")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_key_reads_updated_at() {
        let raw = json!({"updated_at": "2024-01-03 12:00:00"});
        assert_eq!(snapshot_key(&raw), Some("2024-01-03 12:00:00".into()));
        assert_eq!(snapshot_key(&json!({})), None);
        assert_eq!(snapshot_key(&json!({"updated_at": 42})), None);
    }
}
