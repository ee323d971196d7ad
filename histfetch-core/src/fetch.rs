//! Per-symbol fetch with failure isolation.

use crate::data::{DataError, DateRange, HistoryProvider, HistoryTable};

/// Result of fetching one symbol. A failure carries the rendered error so the
/// batch can report it; it never aborts the run.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched(HistoryTable),
    Failed { symbol: String, reason: String },
}

/// Fetch `symbol` with exactly one provider call.
///
/// Errors and empty tables become [`FetchOutcome::Failed`] and are logged
/// with the symbol.
pub fn fetch_one(provider: &dyn HistoryProvider, symbol: &str, range: &DateRange) -> FetchOutcome {
    let result = provider.fetch(symbol, range).and_then(|table| {
        if table.is_empty() {
            Err(DataError::NoData {
                symbol: symbol.to_string(),
            })
        } else {
            Ok(table)
        }
    });

    match result {
        Ok(table) => FetchOutcome::Fetched(table),
        Err(e) => {
            tracing::warn!(symbol, "Error fetching data for {symbol}: {e}");
            FetchOutcome::Failed {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            }
        }
    }
}
