//! Batch orchestrator: fetch every symbol in order, keep the successes.

use crate::data::{DateRange, HistoryProvider, HistoryTable};
use crate::fetch::{fetch_one, FetchOutcome};

/// Symbol → table map that remembers insertion order.
///
/// Re-inserting a symbol replaces its table but keeps its original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryMap {
    entries: Vec<(String, HistoryTable)>,
}

impl HistoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<String>, table: HistoryTable) {
        let symbol = symbol.into();
        match self.entries.iter_mut().find(|(s, _)| *s == symbol) {
            Some((_, existing)) => *existing = table,
            None => self.entries.push((symbol, table)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(s, _)| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HistoryTable)> {
        self.entries.iter().map(|(s, t)| (s.as_str(), t))
    }
}

/// Progress callbacks for a batch run.
pub trait BatchProgress {
    /// Called before fetching a symbol.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called after a symbol's fetch finished, successfully or not.
    fn on_complete(&self, symbol: &str, index: usize, total: usize, outcome: &FetchOutcome);

    /// Called once after the last symbol.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Reports progress through `tracing`. Failures are already logged by the
/// fetcher, so only successes are reported per symbol.
pub struct LogProgress;

impl BatchProgress for LogProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        tracing::info!("[{}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_complete(&self, symbol: &str, _index: usize, _total: usize, outcome: &FetchOutcome) {
        if let FetchOutcome::Fetched(table) = outcome {
            tracing::info!(source = ?table.source, "  OK: {symbol} ({} rows)", table.len());
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!("Download complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Silent progress.
pub struct NoProgress;

impl BatchProgress for NoProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}
    fn on_complete(&self, _symbol: &str, _index: usize, _total: usize, _outcome: &FetchOutcome) {}
    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}

/// Summary of a batch run.
#[derive(Debug)]
pub struct BatchResult {
    pub tables: HistoryMap,
    pub failures: Vec<(String, String)>,
    pub total: usize,
}

impl BatchResult {
    /// Number of successful fetches (duplicates count once per occurrence).
    pub fn succeeded(&self) -> usize {
        self.total - self.failures.len()
    }
}

/// Fetch each symbol in input order, one at a time.
///
/// Every symbol gets exactly one fetch attempt; failures are recorded and the
/// loop moves on.
pub fn run_batch(
    provider: &dyn HistoryProvider,
    symbols: &[String],
    range: &DateRange,
    progress: &dyn BatchProgress,
) -> BatchResult {
    let total = symbols.len();
    let mut tables = HistoryMap::new();
    let mut failures = Vec::new();

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, total);
        let outcome = fetch_one(provider, symbol, range);
        progress.on_complete(symbol, i, total, &outcome);

        match outcome {
            FetchOutcome::Fetched(table) => tables.insert(symbol.as_str(), table),
            FetchOutcome::Failed { symbol, reason } => failures.push((symbol, reason)),
        }
    }

    progress.on_batch_complete(total - failures.len(), failures.len(), total);

    BatchResult {
        tables,
        failures,
        total,
    }
}
