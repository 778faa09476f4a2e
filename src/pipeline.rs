// =============================================================================
// Digest Pipeline — date window, fetch strategy, assembled table
// =============================================================================
//
// Strictly sequential: every provider call is awaited before the next one is
// issued, and any error aborts the run with nothing written.
//
//   Daily  — for each date in the window: 5 requests -> one DailyRecord.
//   Range  — 5 requests for the whole window -> 5 tables -> outer join.
// =============================================================================

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use tracing::{debug, info};

use crate::config::FetchConfig;
use crate::merge::merge_tables;
use crate::provider::MarketDataProvider;
use crate::series::{build_daily_record, fetch_range_tables};
use crate::types::{DateTable, FetchMode};

/// Inclusive range of calendar dates covered by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// `today - lookback_days ..= today`.
    pub fn ending_at(today: NaiveDate, lookback_days: u32) -> Result<Self> {
        let start = today
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .with_context(|| format!("look-back of {lookback_days} days from {today} is out of range"))?;
        Ok(Self { start, end: today })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }
}

/// Run the configured strategy over the window ending at `today`.
pub async fn run<P>(provider: &P, config: &FetchConfig, today: NaiveDate) -> Result<DateTable>
where
    P: MarketDataProvider + ?Sized,
{
    let window = DateWindow::ending_at(today, config.lookback_days)?;

    info!(
        ticker = %config.ticker,
        mode = %config.mode,
        start = %window.start,
        end = %window.end,
        "digest run starting"
    );

    match config.mode {
        FetchMode::Daily => run_daily(provider, config, window).await,
        FetchMode::Range => run_range(provider, config, window).await,
    }
}

async fn run_daily<P>(provider: &P, config: &FetchConfig, window: DateWindow) -> Result<DateTable>
where
    P: MarketDataProvider + ?Sized,
{
    let mut table = DateTable::new();

    for date in window.days() {
        let record = build_daily_record(provider, config, date).await?;
        info!(date = %date, record = ?record, "daily record assembled");
        table.insert(date, record);
    }

    Ok(table)
}

async fn run_range<P>(provider: &P, config: &FetchConfig, window: DateWindow) -> Result<DateTable>
where
    P: MarketDataProvider + ?Sized,
{
    // The provider filter is exclusive, so ask for everything after the day
    // before the window opens.
    let after = window
        .start
        .checked_sub_days(Days::new(1))
        .with_context(|| format!("no date precedes {}", window.start))?;

    let tables = fetch_range_tables(provider, config, after).await?;
    let mut merged = merge_tables(&tables).context("joining indicator tables")?;

    // The provider filters on UTC dates while keys are local dates, so rows
    // can land just outside the window.
    let before = merged.len();
    merged.retain(|date, _| window.contains(*date));
    if merged.len() < before {
        debug!(dropped = before - merged.len(), "rows outside window discarded");
    }

    info!(rows = merged.len(), tables = tables.len(), "indicator tables joined");
    Ok(merged)
}
