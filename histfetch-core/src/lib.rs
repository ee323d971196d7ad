//! histfetch core: download daily price history for a ticker list and write
//! it out as one CSV.
//!
//! - `tickers`: read the ticker column from a spreadsheet or CSV
//! - `data`: Yahoo provider behind a cached, rate-limited HTTP client
//! - `fetch`: one request per symbol, failures isolated per symbol
//! - `batch`: sequential orchestration in input order
//! - `export`: ordered concatenation and CSV output
//! - `pipeline`: the end-to-end run used by the CLI

pub mod batch;
pub mod config;
pub mod data;
pub mod export;
pub mod fetch;
pub mod pipeline;
pub mod tickers;

pub use batch::{run_batch, BatchProgress, BatchResult, HistoryMap, LogProgress, NoProgress};
pub use config::{Config, ConfigError};
pub use export::{consolidate, ConsolidatedRow, ConsolidatedTable, ExportError, ExportTarget};
pub use fetch::{fetch_one, FetchOutcome};
pub use pipeline::{build_provider, run_pipeline, PipelineError, PipelineReport};
pub use tickers::{load_tickers, LoadError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;
    use crate::data::{ReqwestTransport, YahooProvider};

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn yahoo_provider_is_send_sync() {
        assert_send::<YahooProvider<ReqwestTransport>>();
        assert_sync::<YahooProvider<ReqwestTransport>>();
    }

    #[test]
    fn results_are_send() {
        assert_send::<BatchResult>();
        assert_send::<PipelineReport>();
        assert_send::<FetchOutcome>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<PipelineError>();
        assert_sync::<PipelineError>();
    }
}
