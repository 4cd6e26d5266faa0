// In crates/api-client/src/lib.rs

use app_config::types::ApiSettings;
use serde_json::Value;
use std::time::Duration;

pub mod error;
pub mod types;
pub mod watcher;

// Re-export public types
pub use error::{Error, Result};
pub use types::*;
pub use watcher::ResultsWatcher;

impl ApiClient {
    /// Constructs a new ApiClient from ApiSettings.
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| Error::ClientBuildError(e.to_string()))?;
        // The base_url is taken directly from the settings struct
        // that was populated from your .toml file.
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        Ok(ApiClient {
            http_client,
            base_url,
        })
    }

    /// Fetches the latest backtest result payload.
    ///
    /// This corresponds to the `GET /backtest/results` endpoint.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when no backtest has run yet (non-2xx status or an empty
    /// body). The caller maps that to the "no data" view; it is not an error
    /// and not an `ingest` call.
    pub async fn fetch_results(&self) -> Result<Option<Value>> {
        let url = format!("{}/backtest/results", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(Error::RequestFailed)?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "No backtest results available yet.");
            return Ok(None);
        }

        let text = response.text().await.map_err(Error::RequestFailed)?;
        if text.trim().is_empty() || text.trim() == "null" {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(&text).map_err(Error::DeserializationFailed)?;
        Ok(Some(value))
    }

    /// Triggers an asynchronous backtest run on the engine.
    ///
    /// This corresponds to the `POST /backtest/run` endpoint. The engine
    /// computes in the background; no response body is consumed. The new
    /// result shows up on `/backtest/results` with a fresh `updated_at`.
    pub async fn run_backtest(&self, params: &BacktestParams) -> Result<()> {
        let url = format!("{}/backtest/run", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .query(params)
            .send()
            .await
            .map_err(Error::RequestFailed)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let msg = response.text().await.unwrap_or_default();
            return Err(Error::ApiError { status, msg });
        }

        Ok(())
    }
}

// Free function to allow api_client::new usage
pub fn new(settings: &ApiSettings) -> Result<ApiClient> {
    ApiClient::new(settings)
}
