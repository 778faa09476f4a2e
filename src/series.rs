// =============================================================================
// Series Builder — provider responses to records and date tables
// =============================================================================
//
// Two shapes come out of here:
//
//   * `build_daily_record` asks the provider for one date and folds the first
//     point of every series into a `DailyRecord`.  An empty series leaves the
//     field `None`, so the date is still emitted.
//
//   * `fetch_range_tables` asks once per indicator for everything after a
//     start date and turns each series into its own `DateTable`.  An empty
//     series becomes an empty table and contributes nothing to the join.
//
// Within one numeric series, several points on the same calendar day collapse
// to the one with the latest timestamp.  News on the same day collapses into
// a list in provider order.
// =============================================================================

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::config::FetchConfig;
use crate::date_key::{date_key, instant, RawTimestamp};
use crate::merge::group_news;
use crate::provider::{MacdWindows, MarketDataProvider};
use crate::types::{DailyRecord, DateTable, IndicatorKind, IndicatorPoint, MacdPoint, NewsItem, TimeFilter};

pub fn macd_windows(config: &FetchConfig) -> MacdWindows {
    MacdWindows {
        short: config.macd_short_window,
        long: config.macd_long_window,
        signal: config.macd_signal_window,
    }
}

// -----------------------------------------------------------------------------
// Day-by-day
// -----------------------------------------------------------------------------

/// Fetch every series as of `date` and assemble one record.
pub async fn build_daily_record<P>(provider: &P, config: &FetchConfig, date: NaiveDate) -> Result<DailyRecord>
where
    P: MarketDataProvider + ?Sized,
{
    let ticker = config.ticker.as_str();
    let filter = TimeFilter::On(date);

    let ema_short = provider
        .ema(ticker, config.ema_short_window, filter)
        .await
        .with_context(|| format!("ema_short for {ticker} on {date}"))?;
    let ema_long = provider
        .ema(ticker, config.ema_long_window, filter)
        .await
        .with_context(|| format!("ema_long for {ticker} on {date}"))?;
    let macd = provider
        .macd(ticker, macd_windows(config), filter)
        .await
        .with_context(|| format!("macd for {ticker} on {date}"))?;
    let news = provider
        .news(ticker, filter)
        .await
        .with_context(|| format!("news for {ticker} on {date}"))?;
    let rsi = provider
        .rsi(ticker, config.rsi_window, filter)
        .await
        .with_context(|| format!("rsi for {ticker} on {date}"))?;

    let macd_first = macd.first();

    Ok(DailyRecord {
        news: Some(news.into_iter().map(|n| n.title).collect()),
        ema_short: ema_short.first().and_then(|p| p.value),
        ema_long: ema_long.first().and_then(|p| p.value),
        macd_value: macd_first.and_then(|p| p.value),
        macd_signal: macd_first.and_then(|p| p.signal),
        rsi: rsi.first().and_then(|p| p.value),
    })
}

// -----------------------------------------------------------------------------
// Range queries
// -----------------------------------------------------------------------------

/// Fetch every series strictly after `after` and build one table per series.
///
/// Tables are returned in the order EMA-short, EMA-long, MACD, RSI, news.
pub async fn fetch_range_tables<P>(provider: &P, config: &FetchConfig, after: NaiveDate) -> Result<Vec<DateTable>>
where
    P: MarketDataProvider + ?Sized,
{
    let ticker = config.ticker.as_str();
    let filter = TimeFilter::After(after);

    let ema_short = provider
        .ema(ticker, config.ema_short_window, filter)
        .await
        .with_context(|| format!("ema_short for {ticker} after {after}"))?;
    let ema_long = provider
        .ema(ticker, config.ema_long_window, filter)
        .await
        .with_context(|| format!("ema_long for {ticker} after {after}"))?;
    let macd = provider
        .macd(ticker, macd_windows(config), filter)
        .await
        .with_context(|| format!("macd for {ticker} after {after}"))?;
    let rsi = provider
        .rsi(ticker, config.rsi_window, filter)
        .await
        .with_context(|| format!("rsi for {ticker} after {after}"))?;
    let news = provider
        .news(ticker, filter)
        .await
        .with_context(|| format!("news for {ticker} after {after}"))?;

    let tables = vec![
        value_table(IndicatorKind::EmaShort, &ema_short, |rec, v| rec.ema_short = Some(v))?,
        value_table(IndicatorKind::EmaLong, &ema_long, |rec, v| rec.ema_long = Some(v))?,
        macd_table(&macd)?,
        value_table(IndicatorKind::Rsi, &rsi, |rec, v| rec.rsi = Some(v))?,
        news_table(&news)?,
    ];

    Ok(tables)
}

/// Build a one-column table from an EMA or RSI series.
///
/// Points without a value are skipped.
pub fn value_table(
    kind: IndicatorKind,
    points: &[IndicatorPoint],
    set: impl Fn(&mut DailyRecord, f64),
) -> Result<DateTable> {
    let latest = latest_per_day(points.iter().filter_map(|p| p.value.map(move |v| (&p.timestamp, v))))
        .with_context(|| format!("normalising {kind} timestamps"))?;

    let table: DateTable = latest
        .into_iter()
        .map(|(date, v)| {
            let mut rec = DailyRecord::default();
            set(&mut rec, v);
            (date, rec)
        })
        .collect();

    debug!(indicator = %kind, rows = table.len(), "table built");
    Ok(table)
}

/// Build the `macd_value` / `macd_signal` table.
pub fn macd_table(points: &[MacdPoint]) -> Result<DateTable> {
    let latest = latest_per_day(points.iter().map(|p| (&p.timestamp, (p.value, p.signal))))
        .context("normalising macd timestamps")?;

    let table: DateTable = latest
        .into_iter()
        .filter(|(_, (value, signal))| value.is_some() || signal.is_some())
        .map(|(date, (value, signal))| {
            let rec = DailyRecord {
                macd_value: value,
                macd_signal: signal,
                ..Default::default()
            };
            (date, rec)
        })
        .collect();

    debug!(indicator = %IndicatorKind::Macd, rows = table.len(), "table built");
    Ok(table)
}

/// Build the news table: one list of headlines per publication date.
pub fn news_table(items: &[NewsItem]) -> Result<DateTable> {
    let keyed = items
        .iter()
        .map(|n| -> Result<(NaiveDate, String)> {
            Ok((date_key(&n.published_utc)?, n.title.clone()))
        })
        .collect::<Result<Vec<_>>>()
        .context("normalising news timestamps")?;

    let table: DateTable = group_news(keyed)
        .into_iter()
        .map(|(date, titles)| {
            let rec = DailyRecord {
                news: Some(titles),
                ..Default::default()
            };
            (date, rec)
        })
        .collect();

    debug!(indicator = %IndicatorKind::News, rows = table.len(), "table built");
    Ok(table)
}

/// Keep, for each calendar date, the value observed at the latest instant.
fn latest_per_day<'a, T>(
    points: impl Iterator<Item = (&'a RawTimestamp, T)>,
) -> Result<BTreeMap<NaiveDate, T>> {
    let mut best: BTreeMap<NaiveDate, (DateTime<Utc>, T)> = BTreeMap::new();

    for (ts, value) in points {
        let at = instant(ts)?;
        let date = date_key(ts)?;
        match best.get(&date) {
            Some((seen, _)) if *seen >= at => {}
            _ => {
                best.insert(date, (at, value));
            }
        }
    }

    Ok(best.into_iter().map(|(date, (_, v))| (date, v)).collect())
}
