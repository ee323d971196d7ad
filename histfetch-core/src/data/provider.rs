//! History provider trait, record types and structured error types.
//!
//! The HistoryProvider trait abstracts over the source of daily history so the
//! fetcher and the batch orchestrator can be driven by a fake in tests. The
//! production implementation is [`super::yahoo::YahooProvider`], which sits on
//! top of the rate-limited, cached HTTP client.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One trading day of price/volume data for one symbol.
///
/// Prices the provider left blank are carried as NaN and a blank volume as
/// `None`; both are exported as empty cells. `dividends` and `stock_splits`
/// are zero on days without an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
    pub dividends: f64,
    pub stock_splits: f64,
}

/// Daily history for one symbol, date ascending as returned by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryTable {
    pub records: Vec<HistoryRecord>,
    pub source: DataSource,
}

impl HistoryTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Where a table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    Cache,
}

/// Inclusive calendar-date window requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DataError> {
        if start > end {
            return Err(DataError::InvalidDateRange(format!("{start} is after {end}")));
        }
        Ok(Self { start, end })
    }

    /// Window ending on `end` and reaching back `lookback_days` days.
    pub fn ending_on(end: NaiveDate, lookback_days: u32) -> Result<Self, DataError> {
        let start = end
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .ok_or_else(|| {
                DataError::InvalidDateRange(format!(
                    "{lookback_days} days before {end} is out of range"
                ))
            })?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

/// Structured error types for provider operations.
///
/// Each variant renders as a single line so it can go straight into the
/// per-symbol failure log.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status} for {symbol}")]
    Http { status: u16, symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no price data returned for {symbol}")]
    NoData { symbol: String },

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),
}

/// Source of daily history for a symbol over a date range.
///
/// Implementations make at most one upstream attempt per call. Errors are
/// returned to the caller untouched; isolating them per symbol is the
/// fetcher's job.
pub trait HistoryProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily history for `symbol` over `range`.
    fn fetch(&self, symbol: &str, range: &DateRange) -> Result<HistoryTable, DataError>;
}
