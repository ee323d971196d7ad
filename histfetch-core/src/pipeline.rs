//! The linear run: load tickers → fetch each → consolidate → export.
//!
//! Setup (ticker file, output target) is checked before the first request
//! goes out. After that, only an export write failure can fail the run.

use crate::batch::{run_batch, BatchProgress};
use crate::config::{Config, ConfigError};
use crate::data::{
    CachedClient, DataError, DateRange, HistoryProvider, ReqwestTransport, ResponseCache,
    SlidingWindowLimiter, YahooProvider,
};
use crate::export::{consolidate, ExportError, ExportTarget};
use crate::tickers::{load_tickers, LoadError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("ticker source: {0}")]
    Load(#[from] LoadError),

    #[error("export: {0}")]
    Export(#[from] ExportError),

    #[error("client setup: {0}")]
    Client(#[from] DataError),
}

/// What a completed run produced.
#[derive(Debug)]
pub struct PipelineReport {
    pub output_path: PathBuf,
    pub rows_written: usize,
    pub symbols_total: usize,
    pub symbols_succeeded: usize,
    pub failures: Vec<(String, String)>,
}

/// Build the production Yahoo provider: reqwest transport, response cache and
/// sliding-window limiter, all from `config`.
pub fn build_provider(config: &Config) -> Result<YahooProvider<ReqwestTransport>, DataError> {
    let transport = ReqwestTransport::new(&config.user_agent, config.timeout())?;
    let cache = ResponseCache::open(&config.cache_dir, config.cache_expire_after())?;
    tracing::debug!(
        dir = %cache.cache_dir().display(),
        entries = cache.len(),
        "response cache ready"
    );
    let limiter = SlidingWindowLimiter::new(config.max_requests, config.window());
    let client = CachedClient::new(transport, cache, limiter);
    Ok(YahooProvider::new(client, config.auto_adjust))
}

/// Run the whole pipeline against `provider`.
pub fn run_pipeline(
    config: &Config,
    provider: &dyn HistoryProvider,
    range: &DateRange,
    progress: &dyn BatchProgress,
) -> Result<PipelineReport, PipelineError> {
    let symbols = load_tickers(&config.input_path, &config.symbol_column)?;
    let target = ExportTarget::prepare(&config.output_path)?;

    tracing::info!(
        provider = provider.name(),
        start = %range.start(),
        end = %range.end(),
        "fetching {} symbols",
        symbols.len()
    );
    let batch = run_batch(provider, &symbols, range, progress);

    tracing::debug!(
        symbols = ?batch.tables.symbols().collect::<Vec<_>>(),
        "{} symbols with data",
        batch.tables.len()
    );
    let table = consolidate(&batch.tables);
    if table.is_empty() {
        tracing::warn!("no symbol returned data, writing header-only output");
    }
    let output_path = target.write(&table)?;

    Ok(PipelineReport {
        output_path,
        rows_written: table.len(),
        symbols_total: batch.total,
        symbols_succeeded: batch.succeeded(),
        failures: batch.failures,
    })
}
