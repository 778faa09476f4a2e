// =============================================================================
// Shared types used across the market digest
// =============================================================================

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::date_key::RawTimestamp;

/// Everything known about the ticker for one calendar day.
///
/// A `None` field means the provider had no data point for that date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub news: Option<Vec<String>>,
    pub ema_short: Option<f64>,
    pub ema_long: Option<f64>,
    pub macd_value: Option<f64>,
    pub macd_signal: Option<f64>,
    pub rsi: Option<f64>,
}

/// Date-keyed table of records, always iterated in ascending date order.
pub type DateTable = BTreeMap<NaiveDate, DailyRecord>;

/// A single value from an EMA or RSI series.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndicatorPoint {
    pub timestamp: RawTimestamp,
    #[serde(default)]
    pub value: Option<f64>,
}

/// A single value from a MACD series.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MacdPoint {
    pub timestamp: RawTimestamp,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub signal: Option<f64>,
}

/// A news article reduced to what the digest keeps.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub published_utc: RawTimestamp,
}

/// Which indicator a request or table column refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    EmaShort,
    EmaLong,
    Macd,
    Rsi,
    News,
}

impl std::fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmaShort => write!(f, "ema_short"),
            Self::EmaLong => write!(f, "ema_long"),
            Self::Macd => write!(f, "macd"),
            Self::Rsi => write!(f, "rsi"),
            Self::News => write!(f, "news"),
        }
    }
}

/// Time restriction applied to a provider request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFilter {
    /// Data as of exactly this date (`timestamp=`, `published_utc=`).
    On(NaiveDate),
    /// Data strictly after this date (`timestamp.gt=`, `published_utc.gt=`).
    After(NaiveDate),
}

impl TimeFilter {
    /// Query parameter name for a filter on `field`, e.g. `timestamp.gt`.
    pub fn param_name(&self, field: &str) -> String {
        match self {
            Self::On(_) => field.to_string(),
            Self::After(_) => format!("{field}.gt"),
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Self::On(d) | Self::After(d) => *d,
        }
    }
}

/// How the digest walks the date window.
///
/// Config files accept the same spellings as `--mode`: `daily` / `range`,
/// plus the capitalised variant names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// One request per (date, indicator); every date gets a record.
    #[serde(alias = "Daily", alias = "DAILY")]
    Daily,
    /// One request per indicator over the whole window, then an outer join.
    #[serde(alias = "Range", alias = "RANGE")]
    Range,
}

impl Default for FetchMode {
    fn default() -> Self {
        Self::Daily
    }
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "Daily"),
            Self::Range => write!(f, "Range"),
        }
    }
}

impl std::str::FromStr for FetchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "range" => Ok(Self::Range),
            _ => Err(format!("unknown fetch mode '{s}' (expected daily or range)")),
        }
    }
}
