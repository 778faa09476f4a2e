// =============================================================================
// Market Data Provider
// =============================================================================
//
// The digest never computes an indicator itself.  Everything comes from a
// `MarketDataProvider`; the Polygon REST client is the production
// implementation and tests substitute an in-memory one.

pub mod polygon;

pub use polygon::PolygonClient;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{IndicatorPoint, MacdPoint, NewsItem, TimeFilter};

/// Window lengths for a MACD request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacdWindows {
    pub short: u32,
    pub long: u32,
    pub signal: u32,
}

/// Source of news and pre-computed indicator series for one ticker.
///
/// Series are returned in provider order (Polygon sends newest first).
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn news(&self, ticker: &str, filter: TimeFilter) -> Result<Vec<NewsItem>>;

    async fn ema(&self, ticker: &str, window: u32, filter: TimeFilter) -> Result<Vec<IndicatorPoint>>;

    async fn macd(&self, ticker: &str, windows: MacdWindows, filter: TimeFilter) -> Result<Vec<MacdPoint>>;

    async fn rsi(&self, ticker: &str, window: u32, filter: TimeFilter) -> Result<Vec<IndicatorPoint>>;
}
