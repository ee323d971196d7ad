//! Yahoo Finance history provider.
//!
//! Fetches daily bars plus dividend and split events from Yahoo's v8 chart
//! API through the cached, rate-limited client. One request per symbol, no
//! retries.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes; parse failures surface as `ResponseFormatChanged`.

use super::http::{CachedClient, Transport};
use super::provider::{DataError, DataSource, DateRange, HistoryProvider, HistoryRecord, HistoryTable};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;

const CHART_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart/";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    events: Option<ChartEvents>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartEvents {
    #[serde(default)]
    dividends: HashMap<String, DividendEvent>,
    #[serde(default)]
    splits: HashMap<String, SplitEvent>,
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct SplitEvent {
    date: i64,
    numerator: f64,
    denominator: f64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance history provider.
pub struct YahooProvider<T: Transport> {
    client: CachedClient<T>,
    auto_adjust: bool,
}

impl<T: Transport> YahooProvider<T> {
    /// With `auto_adjust`, open/high/low/close are scaled by adjclose/close.
    pub fn new(client: CachedClient<T>, auto_adjust: bool) -> Self {
        Self {
            client,
            auto_adjust,
        }
    }

    pub fn client(&self) -> &CachedClient<T> {
        &self.client
    }

    /// Build the chart API URL for a symbol and date range.
    ///
    /// The window runs from 00:00:00 UTC on the start date to 23:59:59 UTC on
    /// the end date, so the URL (and the cache key) is stable for a whole day.
    pub fn chart_url(symbol: &str, range: &DateRange) -> Result<String, DataError> {
        let start_ts = range.start().and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = range
            .end()
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| DataError::ClientSetup("invalid end-of-day timestamp".into()))?;

        let mut url = reqwest::Url::parse(CHART_BASE_URL)
            .map_err(|e| DataError::ClientSetup(format!("chart base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| DataError::ClientSetup("chart base URL cannot take a path".into()))?
            .pop_if_empty()
            .push(symbol);
        url.query_pairs_mut()
            .append_pair("period1", &start_ts.to_string())
            .append_pair("period2", &end_ts.to_string())
            .append_pair("interval", "1d")
            .append_pair("includeAdjustedClose", "true")
            .append_pair("events", "div,splits");

        Ok(url.into())
    }
}

/// Map a non-2xx status to a provider error.
fn status_error(symbol: &str, status: u16, retry_after_secs: Option<u64>) -> DataError {
    match status {
        401 => DataError::AuthenticationRequired("Yahoo Finance requires authentication".into()),
        404 => DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        429 => DataError::RateLimited {
            retry_after_secs: retry_after_secs.unwrap_or(60),
        },
        _ => DataError::Http {
            status,
            symbol: symbol.to_string(),
        },
    }
}

/// Parse a chart API body into records.
pub(crate) fn parse_chart(
    symbol: &str,
    body: &str,
    auto_adjust: bool,
) -> Result<Vec<HistoryRecord>, DataError> {
    let resp: ChartResponse = serde_json::from_str(body).map_err(|e| {
        DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
    })?;

    let result = match (resp.chart.result, resp.chart.error) {
        (_, Some(err)) if err.code == "Not Found" => {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
        }
        (_, Some(err)) => {
            return Err(DataError::ResponseFormatChanged(format!(
                "{}: {}",
                err.code, err.description
            )))
        }
        (Some(result), None) => result,
        (None, None) => {
            return Err(DataError::ResponseFormatChanged(
                "empty result with no error".into(),
            ))
        }
    };

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

    // A symbol with no trading days in range comes back without timestamps.
    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };

    let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let to_date = |ts: i64| -> Result<NaiveDate, DataError> {
        chrono::DateTime::from_timestamp(ts + offset, 0)
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))
    };

    let events = data.events.unwrap_or_default();
    let mut dividends: HashMap<NaiveDate, f64> = HashMap::new();
    for div in events.dividends.values() {
        *dividends.entry(to_date(div.date)?).or_default() += div.amount;
    }
    let mut splits: HashMap<NaiveDate, f64> = HashMap::new();
    for split in events.splits.values() {
        if split.denominator != 0.0 {
            splits.insert(to_date(split.date)?, split.numerator / split.denominator);
        }
    }

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let mut records = Vec::with_capacity(timestamps.len());

    for (i, &ts) in timestamps.iter().enumerate() {
        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();

        // Holidays/non-trading days come back with every field null.
        if open.is_none() && high.is_none() && low.is_none() && close.is_none() && volume.is_none()
        {
            continue;
        }

        let date = to_date(ts)?;
        let mut record = HistoryRecord {
            date,
            open: open.unwrap_or(f64::NAN),
            high: high.unwrap_or(f64::NAN),
            low: low.unwrap_or(f64::NAN),
            close: close.unwrap_or(f64::NAN),
            volume,
            dividends: dividends.get(&date).copied().unwrap_or(0.0),
            stock_splits: splits.get(&date).copied().unwrap_or(0.0),
        };

        if auto_adjust {
            let adj_close = adj_closes
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten());
            if let Some(adj) = adj_close {
                if record.close.is_finite() && record.close != 0.0 {
                    let ratio = adj / record.close;
                    record.open *= ratio;
                    record.high *= ratio;
                    record.low *= ratio;
                    record.close = adj;
                }
            }
        }

        records.push(record);
    }

    Ok(records)
}

impl<T: Transport> HistoryProvider for YahooProvider<T> {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str, range: &DateRange) -> Result<HistoryTable, DataError> {
        let url = Self::chart_url(symbol, range)?;
        let resp = self.client.get(&url)?;

        if !resp.is_success() {
            return Err(status_error(symbol, resp.status, resp.retry_after_secs));
        }

        let records = parse_chart(symbol, &resp.body, self.auto_adjust)?;
        if records.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
            });
        }

        Ok(HistoryTable {
            records,
            source: if resp.from_cache {
                DataSource::Cache
            } else {
                DataSource::YahooFinance
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cache::ResponseCache;
    use crate::data::http::HttpResponse;
    use crate::data::rate_limit::SlidingWindowLimiter;
    use std::time::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // 2024-01-02..04 at 14:30 UTC, with a null row and a dividend on the 3rd.
    const BODY: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"gmtoffset": -18000},
                "timestamp": [1704205800, 1704292200, 1704378600, 1704465000],
                "events": {
                    "dividends": {"1704292200": {"amount": 0.5, "date": 1704292200}},
                    "splits": {"1704378600": {"date": 1704378600, "numerator": 2, "denominator": 1, "splitRatio": "2:1"}}
                },
                "indicators": {
                    "quote": [{
                        "open":   [10.0, 11.0, null, 12.0],
                        "high":   [10.5, 11.5, null, 12.5],
                        "low":    [9.5,  10.5, null, 11.5],
                        "close":  [10.0, 11.0, null, 12.0],
                        "volume": [100,  200,  null, 300]
                    }],
                    "adjclose": [{"adjclose": [5.0, 11.0, null, 12.0]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_rows_and_events() {
        let records = parse_chart("AAA", BODY, false).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].date, date(2024, 1, 2));
        assert_eq!(records[1].date, date(2024, 1, 3));
        assert_eq!(records[1].dividends, 0.5);
        assert_eq!(records[0].dividends, 0.0);
        assert_eq!(records[2].date, date(2024, 1, 5));
        assert_eq!(records[2].volume, Some(300));
        assert_eq!(records[2].stock_splits, 0.0);
    }

    #[test]
    fn auto_adjust_scales_prices() {
        let records = parse_chart("AAA", BODY, true).unwrap();
        assert_eq!(records[0].close, 5.0);
        assert_eq!(records[0].open, 5.0);
        assert_eq!(records[0].high, 5.25);
        assert_eq!(records[0].volume, Some(100));
        assert_eq!(records[1].close, 11.0);
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        match parse_chart("ZZZ", body, true) {
            Err(DataError::SymbolNotFound { symbol }) => assert_eq!(symbol, "ZZZ"),
            other => panic!("expected SymbolNotFound, got: {other:?}"),
        }
    }

    #[test]
    fn garbage_body_is_format_error() {
        assert!(matches!(
            parse_chart("AAA", "<html>", true),
            Err(DataError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn missing_timestamps_means_no_rows() {
        let body = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(parse_chart("AAA", body, true).unwrap().is_empty());
    }

    #[test]
    fn chart_url_covers_whole_days_and_encodes_symbol() {
        let range = DateRange::new(date(2024, 1, 2), date(2024, 1, 3)).unwrap();
        let url = YahooProvider::<NullTransport>::chart_url("BRK/B", &range).unwrap();
        assert!(url.starts_with("https://query2.finance.yahoo.com/v8/finance/chart/BRK%2FB?"));
        assert!(url.contains("period1=1704153600"));
        assert!(url.contains("period2=1704326399"));
        assert!(url.contains("interval=1d"));
        assert!(url.contains("events=div%2Csplits"));
    }

    struct NullTransport(u16);

    impl Transport for NullTransport {
        fn get(&self, _url: &str) -> Result<HttpResponse, DataError> {
            Ok(HttpResponse::new(self.0, "{}"))
        }
    }

    fn provider(status: u16) -> (tempfile::TempDir, YahooProvider<NullTransport>) {
        let dir = tempfile::tempdir().unwrap();
        let client = CachedClient::new(
            NullTransport(status),
            ResponseCache::open(dir.path(), None).unwrap(),
            SlidingWindowLimiter::new(100, Duration::from_millis(1)),
        );
        (dir, YahooProvider::new(client, true))
    }

    #[test]
    fn status_codes_map_to_errors() {
        let range = DateRange::new(date(2024, 1, 2), date(2024, 1, 3)).unwrap();
        let cases: [(u16, fn(&DataError) -> bool); 5] = [
            (404, |e: &DataError| matches!(e, DataError::SymbolNotFound { .. })),
            (401, |e: &DataError| matches!(e, DataError::AuthenticationRequired(_))),
            (403, |e: &DataError| matches!(e, DataError::Http { status: 403, .. })),
            (429, |e: &DataError| matches!(e, DataError::RateLimited { retry_after_secs: 60 })),
            (502, |e: &DataError| matches!(e, DataError::Http { status: 502, .. })),
        ];
        for (status, check) in cases {
            let (_dir, p) = provider(status);
            let err = p.fetch("AAA", &range).unwrap_err();
            assert!(check(&err), "status {status} gave {err:?}");
        }
    }

    #[test]
    fn missing_volume_stays_missing() {
        let body = r#"{"chart":{"result":[{
            "timestamp": [1704205800],
            "indicators": {"quote": [{
                "open": [10.0], "high": [10.5], "low": [9.5], "close": [10.0], "volume": [null]
            }]}
        }],"error":null}}"#;
        let records = parse_chart("AAA", body, false).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].volume, None);
        assert_eq!(records[0].close, 10.0);
    }

    #[test]
    fn error_status_does_not_block_next_request() {
        let range = DateRange::new(date(2024, 1, 2), date(2024, 1, 3)).unwrap();
        let (_dir, p) = provider(403);
        for symbol in ["AAA", "BBB", "CCC", "DDD"] {
            assert!(matches!(
                p.fetch(symbol, &range),
                Err(DataError::Http { status: 403, .. })
            ));
        }
    }
}
