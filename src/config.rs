// =============================================================================
// Fetch Configuration — tunables for one digest run
// =============================================================================
//
// Every request parameter lives here and is passed explicitly to the client
// and the pipeline.  All fields carry `#[serde(default)]` so a partial JSON
// file (or none at all) still yields a complete configuration.
//
// The API key is not part of the JSON file; it comes from the environment and
// is kept in `ApiSettings`, whose `Debug` output is redacted.
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::FetchMode;

/// Environment variable holding the Polygon API key.
pub const API_KEY_ENV: &str = "POLYGON_API_KEY";

/// Name of the file written into the output directory.
pub const OUTPUT_FILE_NAME: &str = "data.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_ticker() -> String {
    "TSLA".to_string()
}

fn default_lookback_days() -> u32 {
    3
}

fn default_timespan() -> String {
    "day".to_string()
}

fn default_series_type() -> String {
    "close".to_string()
}

fn default_ema_short_window() -> u32 {
    50
}

fn default_ema_long_window() -> u32 {
    200
}

fn default_macd_short_window() -> u32 {
    12
}

fn default_macd_long_window() -> u32 {
    26
}

fn default_macd_signal_window() -> u32 {
    9
}

fn default_rsi_window() -> u32 {
    14
}

fn default_news_limit() -> u32 {
    10
}

fn default_indicator_limit() -> u32 {
    5000
}

fn default_max_pages() -> u32 {
    10
}

fn default_base_url() -> String {
    "https://api.polygon.io".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_output_dir_env() -> String {
    "BUILD_WORKSPACE_DIRECTORY".to_string()
}

// =============================================================================
// FetchConfig
// =============================================================================

/// Everything that shapes the requests and the output of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    // --- What to fetch -------------------------------------------------------

    /// Symbol queried on every endpoint.
    #[serde(default = "default_ticker")]
    pub ticker: String,

    /// Day-by-day requests or range requests followed by a join.
    #[serde(default)]
    pub mode: FetchMode,

    /// Window length: the run covers `today - lookback_days ..= today`.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    // --- Indicator parameters -----------------------------------------------

    #[serde(default = "default_timespan")]
    pub timespan: String,

    #[serde(default = "default_series_type")]
    pub series_type: String,

    #[serde(default = "default_ema_short_window")]
    pub ema_short_window: u32,

    #[serde(default = "default_ema_long_window")]
    pub ema_long_window: u32,

    #[serde(default = "default_macd_short_window")]
    pub macd_short_window: u32,

    #[serde(default = "default_macd_long_window")]
    pub macd_long_window: u32,

    #[serde(default = "default_macd_signal_window")]
    pub macd_signal_window: u32,

    #[serde(default = "default_rsi_window")]
    pub rsi_window: u32,

    // --- Paging --------------------------------------------------------------

    /// Page size for news requests.
    #[serde(default = "default_news_limit")]
    pub news_limit: u32,

    /// Page size for indicator requests in range mode.
    #[serde(default = "default_indicator_limit")]
    pub indicator_limit: u32,

    /// Upper bound on `next_url` pages followed for one news query.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    // --- Transport & output -------------------------------------------------

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Environment variable naming the directory `data.json` is written to.
    #[serde(default = "default_output_dir_env")]
    pub output_dir_env: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            ticker: default_ticker(),
            mode: FetchMode::default(),
            lookback_days: default_lookback_days(),
            timespan: default_timespan(),
            series_type: default_series_type(),
            ema_short_window: default_ema_short_window(),
            ema_long_window: default_ema_long_window(),
            macd_short_window: default_macd_short_window(),
            macd_long_window: default_macd_long_window(),
            macd_signal_window: default_macd_signal_window(),
            rsi_window: default_rsi_window(),
            news_limit: default_news_limit(),
            indicator_limit: default_indicator_limit(),
            max_pages: default_max_pages(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            output_dir_env: default_output_dir_env(),
        }
    }
}

impl FetchConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error; the caller decides whether to fall back to
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fetch config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse fetch config from {}", path.display()))?;

        info!(
            path = %path.display(),
            ticker = %config.ticker,
            mode = %config.mode,
            "fetch config loaded"
        );

        Ok(config)
    }

    /// Resolve `<$output_dir_env>/data.json`.
    pub fn output_path(&self) -> Result<PathBuf> {
        let dir = std::env::var(&self.output_dir_env).with_context(|| {
            format!("output directory variable {} is not set", self.output_dir_env)
        })?;
        Ok(PathBuf::from(dir).join(OUTPUT_FILE_NAME))
    }
}

// =============================================================================
// ApiSettings
// =============================================================================

/// Credentials for the data provider.
#[derive(Clone)]
pub struct ApiSettings {
    pub api_key: String,
}

impl ApiSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Read the key from [`API_KEY_ENV`].
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .with_context(|| format!("{API_KEY_ENV} is not set"))?;
        Ok(Self::new(api_key))
    }
}

impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("api_key", &"<redacted>")
            .finish()
    }
}
