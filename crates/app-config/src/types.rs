// In crates/app-config/src/types.rs

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Settings for the backtest engine's HTTP API.
    pub api: ApiSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiSettings {
    /// The base URL of the backtest engine (e.g., "http://localhost:8000").
    pub base_url: String,
    /// Per-request timeout for calls to the engine.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// How often the watcher re-fetches `/backtest/results`.
    #[serde(default = "default_results_poll")]
    pub results_poll_secs: u64,
}

/// Helper functions for serde defaults
fn default_request_timeout() -> u64 {
    10
}
fn default_results_poll() -> u64 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_settings_fill_in_defaults() {
        let api: ApiSettings = toml::from_str("base_url = \"http://localhost:8000\"").unwrap();
        assert_eq!(api.base_url, "http://localhost:8000");
        assert_eq!(api.request_timeout_secs, 10);
        assert_eq!(api.results_poll_secs, 2);
    }
}
