// =============================================================================
// Market Digest — Main Entry Point
// =============================================================================
//
// Fetches news and indicator series for one ticker over a short date window
// and writes them to `data.json`, keyed by calendar date.  Runs to completion
// on a single thread; any provider or I/O error aborts the run.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod config;
mod date_key;
mod merge;
mod output;
mod pipeline;
mod provider;
mod series;
mod types;

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{ApiSettings, FetchConfig, OUTPUT_FILE_NAME};
use crate::provider::PolygonClient;
use crate::types::FetchMode;

/// Daily news and technical indicators for a ticker, as date-keyed JSON.
#[derive(Debug, Parser)]
#[command(name = "market-digest", version)]
struct Cli {
    /// Ticker symbol (overrides the config file).
    #[arg(short, long)]
    ticker: Option<String>,

    /// Fetch strategy: `daily` or `range`.
    #[arg(short, long)]
    mode: Option<FetchMode>,

    /// Number of days to look back from today.
    #[arg(short, long)]
    days: Option<u32>,

    /// JSON config file; defaults are used if it cannot be read.
    #[arg(short, long, default_value = "market_digest.json")]
    config: PathBuf,

    /// Directory for data.json (overrides the output directory variable).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

impl Cli {
    /// Apply flags on top of file/default configuration.
    fn apply_to(&self, config: &mut FetchConfig) {
        if let Some(ticker) = &self.ticker {
            config.ticker = ticker.trim().to_uppercase();
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(days) = self.days {
            config.lookback_days = days;
        }
    }

    /// `--output-dir` wins over the directory variable named in the config.
    fn output_path(&self, config: &FetchConfig) -> anyhow::Result<PathBuf> {
        match &self.output_dir {
            Some(dir) => Ok(dir.join(OUTPUT_FILE_NAME)),
            None => config.output_path(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = FetchConfig::load(&cli.config).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        FetchConfig::default()
    });

    cli.apply_to(&mut config);
    let output_path = cli.output_path(&config)?;

    info!(
        ticker = %config.ticker,
        mode = %config.mode,
        lookback_days = config.lookback_days,
        output = %output_path.display(),
        "Configured digest"
    );

    // ── 2. Provider client ───────────────────────────────────────────────
    let settings = ApiSettings::from_env()?;
    let client = PolygonClient::new(&settings, &config)?;

    // ── 3. Fetch & assemble ──────────────────────────────────────────────
    let today = chrono::Local::now().date_naive();
    let table = pipeline::run(&client, &config, today).await?;

    // ── 4. Write ─────────────────────────────────────────────────────────
    output::write_table(&table, &output_path)?;

    info!(rows = table.len(), path = %output_path.display(), "Market digest complete");
    Ok(())
}
