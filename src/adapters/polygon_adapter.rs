//! Polygon.io daily aggregates provider.
//!
//! One blocking request per symbol against
//! `/v2/aggs/ticker/{symbol}/range/1/day/{from}/{to}`. Any non-success status,
//! unparseable body or empty result set is reported as `DataUnavailable`.
//! Retries are layered on top by `RetryingDataPort`.

use crate::domain::error::ScannerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    #[serde(default)]
    results: Option<Vec<AggregateBar>>,
    #[serde(default)]
    status: Option<String>,
}

/// One aggregate window; `t` is the window start in epoch milliseconds.
#[derive(Debug, Deserialize)]
struct AggregateBar {
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

pub struct PolygonAdapter {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
}

impl PolygonAdapter {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ScannerError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ScannerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(std::io::Error::other)?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn aggregates_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}?adjusted=true&sort=asc&limit=50000",
            self.base_url,
            symbol,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
        )
    }
}

fn unavailable(symbol: &str, reason: impl Into<String>) -> ScannerError {
    ScannerError::DataUnavailable {
        symbol: symbol.to_string(),
        reason: reason.into(),
    }
}

/// Turn a response body into bars, oldest first.
fn parse_aggregates(symbol: &str, body: &str) -> Result<Vec<OhlcvBar>, ScannerError> {
    let response: AggregatesResponse = serde_json::from_str(body)
        .map_err(|e| unavailable(symbol, format!("failed to parse response: {}", e)))?;

    let results = match response.results {
        Some(results) if !results.is_empty() => results,
        _ => {
            let status = response.status.unwrap_or_else(|| "no status".to_string());
            return Err(unavailable(symbol, format!("empty result set ({})", status)));
        }
    };

    let mut bars = results
        .into_iter()
        .map(|agg| {
            let date = chrono::DateTime::from_timestamp_millis(agg.t)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| unavailable(symbol, format!("invalid timestamp: {}", agg.t)))?;
            Ok(OhlcvBar {
                date,
                open: agg.o,
                high: agg.h,
                low: agg.l,
                close: agg.c,
                volume: agg.v.max(0.0).round() as u64,
            })
        })
        .collect::<Result<Vec<_>, ScannerError>>()?;

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

impl DataPort for PolygonAdapter {
    fn fetch_daily_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScannerError> {
        let url = self.aggregates_url(symbol, start_date, end_date);
        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .map_err(|e| unavailable(symbol, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(symbol, format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .map_err(|e| unavailable(symbol, format!("failed to read body: {}", e)))?;
        parse_aggregates(symbol, &body)
    }

    fn name(&self) -> &str {
        "polygon"
    }
}
