// =============================================================================
// Polygon REST Client — news and technical indicator endpoints
// =============================================================================
//
// The API key travels as the `apiKey` query parameter on every request,
// including `next_url` follow-ups (Polygon strips it from the cursor URL).
// The key is never logged.
//
// Endpoints:
//   GET /v2/reference/news             results[] { title, published_utc }, next_url
//   GET /v1/indicators/ema/{ticker}    results.values[] { timestamp, value }
//   GET /v1/indicators/macd/{ticker}   results.values[] { timestamp, value, signal }
//   GET /v1/indicators/rsi/{ticker}    results.values[] { timestamp, value }
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::config::{ApiSettings, FetchConfig};
use crate::provider::{MacdWindows, MarketDataProvider};
use crate::types::{IndicatorPoint, MacdPoint, NewsItem, TimeFilter};

/// Polygon.io REST client.
#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    base_url: String,
    timespan: String,
    series_type: String,
    news_limit: u32,
    indicator_limit: u32,
    max_pages: u32,
    client: reqwest::Client,
}

impl PolygonClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Build a client from the run configuration and credentials.
    pub fn new(settings: &ApiSettings, config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build reqwest client for PolygonClient")?;

        debug!(base_url = %config.base_url, "PolygonClient initialised");

        Ok(Self {
            api_key: settings.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timespan: config.timespan.clone(),
            series_type: config.series_type.clone(),
            news_limit: config.news_limit,
            indicator_limit: config.indicator_limit,
            max_pages: config.max_pages,
            client,
        })
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    /// GET `url` with `params` plus the API key; bail on a non-2xx status.
    async fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<serde_json::Value> {
        let resp = self
            .client
            .get(url)
            .query(params)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await
            .with_context(|| format!("GET {url} request failed"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .with_context(|| format!("failed to read response body from {url}"))?;

        if !status.is_success() {
            anyhow::bail!("Polygon GET {} returned {}: {}", url, status, text);
        }

        serde_json::from_str(&text).with_context(|| format!("failed to parse response from {url}"))
    }

    /// Query parameters shared by every indicator endpoint.
    fn indicator_params(&self, filter: TimeFilter) -> Vec<(String, String)> {
        vec![
            ("timespan".to_string(), self.timespan.clone()),
            ("series_type".to_string(), self.series_type.clone()),
            (filter.param_name("timestamp"), filter.date().to_string()),
            ("limit".to_string(), self.indicator_limit.to_string()),
        ]
    }

    /// Fetch one indicator endpoint and decode `results.values`.
    ///
    /// A missing `results` or `values` member means the provider had no data
    /// and yields an empty vector.
    async fn fetch_values<T: DeserializeOwned>(
        &self,
        indicator: &str,
        ticker: &str,
        params: Vec<(String, String)>,
    ) -> Result<Vec<T>> {
        let url = format!("{}/v1/indicators/{}/{}", self.base_url, indicator, ticker);
        let body = self.get_json(&url, &params).await?;

        let values = &body["results"]["values"];
        if values.is_null() {
            debug!(indicator, ticker, "no values in response");
            return Ok(Vec::new());
        }

        serde_json::from_value(values.clone())
            .with_context(|| format!("failed to decode {indicator} values for {ticker}"))
    }
}

#[async_trait]
impl MarketDataProvider for PolygonClient {
    /// GET /v2/reference/news, following `next_url` up to `max_pages` pages.
    #[instrument(skip(self), name = "polygon::news")]
    async fn news(&self, ticker: &str, filter: TimeFilter) -> Result<Vec<NewsItem>> {
        let first_url = format!("{}/v2/reference/news", self.base_url);
        let first_params = vec![
            ("ticker".to_string(), ticker.to_string()),
            ("limit".to_string(), self.news_limit.to_string()),
            (filter.param_name("published_utc"), filter.date().to_string()),
        ];

        let mut items = Vec::new();
        let mut next: Option<String> = None;
        let mut pages = 0;

        loop {
            let body = match next.take() {
                None => self.get_json(&first_url, &first_params).await?,
                Some(url) => self.get_json(&url, &[]).await?,
            };
            pages += 1;

            if let Some(results) = body.get("results").filter(|r| !r.is_null()) {
                let page: Vec<NewsItem> = serde_json::from_value(results.clone())
                    .with_context(|| format!("failed to decode news page {pages} for {ticker}"))?;
                items.extend(page);
            }

            match body["next_url"].as_str() {
                Some(url) if pages < self.max_pages => next = Some(url.to_string()),
                Some(_) => {
                    warn!(ticker, pages, "news pagination stopped at max_pages");
                    break;
                }
                None => break,
            }
        }

        debug!(ticker, pages, count = items.len(), "news fetched");
        Ok(items)
    }

    /// GET /v1/indicators/ema/{ticker}.
    #[instrument(skip(self), name = "polygon::ema")]
    async fn ema(&self, ticker: &str, window: u32, filter: TimeFilter) -> Result<Vec<IndicatorPoint>> {
        let mut params = self.indicator_params(filter);
        params.push(("window".to_string(), window.to_string()));

        let values: Vec<IndicatorPoint> = self.fetch_values("ema", ticker, params).await?;
        debug!(ticker, window, count = values.len(), "ema fetched");
        Ok(values)
    }

    /// GET /v1/indicators/macd/{ticker}.
    #[instrument(skip(self), name = "polygon::macd")]
    async fn macd(&self, ticker: &str, windows: MacdWindows, filter: TimeFilter) -> Result<Vec<MacdPoint>> {
        let mut params = self.indicator_params(filter);
        params.push(("short_window".to_string(), windows.short.to_string()));
        params.push(("long_window".to_string(), windows.long.to_string()));
        params.push(("signal_window".to_string(), windows.signal.to_string()));

        let values: Vec<MacdPoint> = self.fetch_values("macd", ticker, params).await?;
        debug!(ticker, count = values.len(), "macd fetched");
        Ok(values)
    }

    /// GET /v1/indicators/rsi/{ticker}.
    #[instrument(skip(self), name = "polygon::rsi")]
    async fn rsi(&self, ticker: &str, window: u32, filter: TimeFilter) -> Result<Vec<IndicatorPoint>> {
        let mut params = self.indicator_params(filter);
        params.push(("window".to_string(), window.to_string()));

        let values: Vec<IndicatorPoint> = self.fetch_values("rsi", ticker, params).await?;
        debug!(ticker, window, count = values.len(), "rsi fetched");
        Ok(values)
    }
}

impl std::fmt::Debug for PolygonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolygonClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timespan", &self.timespan)
            .field("series_type", &self.series_type)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_key::RawTimestamp;
    use chrono::NaiveDate;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> PolygonClient {
        let config = FetchConfig {
            base_url: server.url(),
            ..Default::default()
        };
        PolygonClient::new(&ApiSettings::new("test-key"), &config).unwrap()
    }

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[tokio::test]
    async fn ema_sends_window_and_exact_timestamp() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/indicators/ema/TSLA")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("apiKey".into(), "test-key".into()),
                Matcher::UrlEncoded("window".into(), "50".into()),
                Matcher::UrlEncoded("timespan".into(), "day".into()),
                Matcher::UrlEncoded("series_type".into(), "close".into()),
                Matcher::UrlEncoded("timestamp".into(), "2024-01-02".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"results":{"values":[{"timestamp":1704171600000,"value":241.5}]},"status":"OK"}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let values = client.ema("TSLA", 50, TimeFilter::On(jan(2))).await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            values,
            vec![IndicatorPoint {
                timestamp: RawTimestamp::Millis(1_704_171_600_000),
                value: Some(241.5),
            }]
        );
    }

    #[tokio::test]
    async fn macd_uses_greater_than_filter_in_range_queries() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/indicators/macd/TSLA")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("timestamp.gt".into(), "2024-01-01".into()),
                Matcher::UrlEncoded("short_window".into(), "12".into()),
                Matcher::UrlEncoded("long_window".into(), "26".into()),
                Matcher::UrlEncoded("signal_window".into(), "9".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"results":{"values":[
                    {"timestamp":1704258000000,"value":1.5,"signal":1.2,"histogram":0.3},
                    {"timestamp":1704171600000,"value":1.1,"signal":0.9,"histogram":0.2}
                ]}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let windows = MacdWindows { short: 12, long: 26, signal: 9 };
        let values = client.macd("TSLA", windows, TimeFilter::After(jan(1))).await.unwrap();

        mock.assert_async().await;
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].value, Some(1.5));
        assert_eq!(values[0].signal, Some(1.2));
    }

    #[tokio::test]
    async fn missing_values_mean_empty_series() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/indicators/rsi/TSLA")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"results":{},"status":"OK"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let values = client.rsi("TSLA", 14, TimeFilter::On(jan(6))).await.unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn news_follows_next_url() {
        let mut server = mockito::Server::new_async().await;
        let next_url = format!("{}/v2/reference/news?cursor=page2", server.url());

        let first = server
            .mock("GET", "/v2/reference/news")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ticker".into(), "TSLA".into()),
                Matcher::UrlEncoded("limit".into(), "10".into()),
                Matcher::UrlEncoded("published_utc".into(), "2024-01-02".into()),
            ]))
            .with_status(200)
            .with_body(format!(
                r#"{{"results":[{{"title":"A","published_utc":"2024-01-02T10:00:00Z"}}],"next_url":"{next_url}"}}"#
            ))
            .create_async()
            .await;

        let second = server
            .mock("GET", "/v2/reference/news")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("cursor".into(), "page2".into()),
                Matcher::UrlEncoded("apiKey".into(), "test-key".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"results":[{"title":"B","published_utc":"2024-01-02T08:00:00Z"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let items = client.news("TSLA", TimeFilter::On(jan(2))).await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let titles: Vec<_> = items.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn news_pagination_is_bounded() {
        let mut server = mockito::Server::new_async().await;
        let next_url = format!("{}/v2/reference/news?cursor=again", server.url());
        let mock = server
            .mock("GET", "/v2/reference/news")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(format!(
                r#"{{"results":[{{"title":"loop","published_utc":"2024-01-02T10:00:00Z"}}],"next_url":"{next_url}"}}"#
            ))
            .expect(2)
            .create_async()
            .await;

        let config = FetchConfig {
            base_url: server.url(),
            max_pages: 2,
            ..Default::default()
        };
        let client = PolygonClient::new(&ApiSettings::new("k"), &config).unwrap();
        let items = client.news("TSLA", TimeFilter::After(jan(1))).await.unwrap();

        mock.assert_async().await;
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn http_error_carries_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/indicators/ema/TSLA")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(r#"{"status":"NOT_AUTHORIZED","message":"bad key"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.ema("TSLA", 50, TimeFilter::On(jan(2))).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("403"), "unexpected error: {msg}");
    }

    #[test]
    fn debug_output_hides_key() {
        let client = PolygonClient::new(&ApiSettings::new("hidden"), &FetchConfig::default()).unwrap();
        let shown = format!("{client:?}");
        assert!(!shown.contains("hidden"));
    }
}
