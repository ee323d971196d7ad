//! histfetch: download daily price history for every ticker in a spreadsheet
//! and write it to one CSV.
//!
//! Running with no arguments uses `histfetch.toml` from the working directory
//! if present, otherwise the built-in defaults (`data/emisoras.xls` in,
//! `data/historical_data.csv` out). Per-ticker failures are logged and do not
//! change the exit code; setup failures do.

use anyhow::{Context, Result};
use clap::Parser;
use histfetch_core::{build_provider, run_pipeline, Config, LogProgress};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "histfetch",
    about = "Download ten years of daily history for a ticker list into one CSV"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./histfetch.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log cache hits and rate-limiter waits.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "histfetch_core=debug,histfetch=debug"
    } else {
        "histfetch_core=info,histfetch=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let range = config
        .date_range(chrono::Local::now().date_naive())
        .context("failed to compute date range")?;

    let provider = build_provider(&config).context("failed to set up HTTP client")?;
    let report = run_pipeline(&config, &provider, &range, &LogProgress)
        .context("pipeline aborted")?;

    if !report.failures.is_empty() {
        tracing::warn!(
            "{} of {} tickers failed",
            report.failures.len(),
            report.symbols_total
        );
    }
    tracing::info!(rows = report.rows_written, "export finished");
    println!("Data written to {}", report.output_path.display());

    Ok(())
}
