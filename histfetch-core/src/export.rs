//! Consolidated table export (CSV).
//!
//! Per-symbol tables are appended one after another in map order, each row
//! tagged with the symbol it was stored under. The CSV has one header row and
//! no index column. An empty map produces a header-only file.
//!
//! The output target is opened before any fetching starts, so an unwritable
//! path fails the run early. Rows go to `{file}.tmp` and are renamed into
//! place once fully written.

use crate::batch::HistoryMap;
use crate::data::HistoryRecord;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const HEADER: [&str; 9] = [
    "Date",
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "Dividends",
    "Stock Splits",
    "Ticker",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot prepare output file {}: {source}", path.display())]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("output I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One output row: a record plus the symbol it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedRow {
    pub symbol: String,
    pub record: HistoryRecord,
}

/// All successful symbols' rows, grouped by symbol in map order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsolidatedTable {
    pub rows: Vec<ConsolidatedRow>,
}

impl ConsolidatedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Append every table in `map` order, tagging rows with their map key.
pub fn consolidate(map: &HistoryMap) -> ConsolidatedTable {
    let mut rows = Vec::with_capacity(map.iter().map(|(_, t)| t.len()).sum());
    for (symbol, table) in map.iter() {
        rows.extend(table.records.iter().map(|record| ConsolidatedRow {
            symbol: symbol.to_string(),
            record: record.clone(),
        }));
    }
    ConsolidatedTable { rows }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    date: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<u64>,
    dividends: f64,
    stock_splits: f64,
    ticker: &'a str,
}

/// NaN prices are written as empty cells, like a missing volume.
fn price(v: f64) -> Option<f64> {
    (!v.is_nan()).then_some(v)
}

impl<'a> From<&'a ConsolidatedRow> for CsvRow<'a> {
    fn from(row: &'a ConsolidatedRow) -> Self {
        let r = &row.record;
        Self {
            date: r.date.format("%Y-%m-%d").to_string(),
            open: price(r.open),
            high: price(r.high),
            low: price(r.low),
            close: price(r.close),
            volume: r.volume,
            dividends: r.dividends,
            stock_splits: r.stock_splits,
            ticker: &row.symbol,
        }
    }
}

/// An output file opened ahead of time. Dropping it without calling
/// [`ExportTarget::write`] removes the temporary file.
#[derive(Debug)]
pub struct ExportTarget {
    path: PathBuf,
    tmp_path: PathBuf,
    file: Option<File>,
}

impl ExportTarget {
    /// Create the parent directory and open `{path}.tmp` for writing.
    pub fn prepare(path: &Path) -> Result<Self, ExportError> {
        let prepare_err = |source| ExportError::Prepare {
            path: path.to_path_buf(),
            source,
        };

        let file_name = path.file_name().ok_or_else(|| {
            prepare_err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "output path has no file name",
            ))
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(prepare_err)?;
        }

        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);
        let file = File::create(&tmp_path).map_err(prepare_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            file: Some(file),
        })
    }

    /// Write `table` and move the file into place. Returns the final path.
    pub fn write(mut self, table: &ConsolidatedTable) -> Result<PathBuf, ExportError> {
        let Some(file) = self.file.take() else {
            return Err(ExportError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "output file already written",
            )));
        };

        let written = write_rows(file, table).and_then(|()| {
            fs::rename(&self.tmp_path, &self.path)?;
            Ok(())
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&self.tmp_path);
            return Err(e);
        }
        Ok(self.path.clone())
    }
}

fn write_rows(file: File, table: &ConsolidatedTable) -> Result<(), ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));
    writer.write_record(HEADER)?;
    for row in &table.rows {
        writer.serialize(CsvRow::from(row))?;
    }
    let mut inner = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    inner.flush()?;
    Ok(())
}

impl Drop for ExportTarget {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataSource, HistoryTable};
    use chrono::NaiveDate;

    fn record(day: u32, close: f64) -> HistoryRecord {
        HistoryRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: Some(1000),
            dividends: 0.0,
            stock_splits: 0.0,
        }
    }

    fn write_csv(table: &ConsolidatedTable, path: &Path) -> Result<PathBuf, ExportError> {
        ExportTarget::prepare(path)?.write(table)
    }

    fn table(records: Vec<HistoryRecord>) -> HistoryTable {
        HistoryTable {
            records,
            source: DataSource::YahooFinance,
        }
    }

    #[test]
    fn consolidate_groups_by_symbol_in_map_order() {
        let mut map = HistoryMap::new();
        map.insert("BBB", table(vec![record(2, 20.0), record(3, 21.0)]));
        map.insert("AAA", table(vec![record(2, 10.0)]));

        let t = consolidate(&map);
        let tags: Vec<&str> = t.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(tags, vec!["BBB", "BBB", "AAA"]);
        assert_eq!(t.rows[1].record.close, 21.0);
    }

    #[test]
    fn writes_header_and_tagged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/historical_data.csv");

        let mut map = HistoryMap::new();
        let mut odd = record(3, 11.5);
        odd.open = f64::NAN;
        odd.volume = None;
        odd.dividends = 0.25;
        map.insert("AAA", table(vec![record(2, 10.0), odd]));

        let written = write_csv(&consolidate(&map), &path).unwrap();
        assert_eq!(written, path);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Date,Open,High,Low,Close,Volume,Dividends,Stock Splits,Ticker",
                "2024-01-02,9.0,11.0,8.0,10.0,1000,0.0,0.0,AAA",
                "2024-01-03,,12.5,9.5,11.5,,0.25,0.0,AAA",
            ]
        );
        assert!(!dir.path().join("out/historical_data.csv.tmp").exists());
    }

    #[test]
    fn empty_map_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_csv(&consolidate(&HistoryMap::new()), &path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Date,Open,High,Low,Close,Volume,Dividends,Stock Splits,Ticker\n"
        );
    }

    #[test]
    fn dropped_target_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let target = ExportTarget::prepare(&path).unwrap();
        assert!(dir.path().join("out.csv.tmp").exists());
        drop(target);
        assert!(!dir.path().join("out.csv.tmp").exists());
        assert!(!path.exists());
    }

    #[test]
    fn unwritable_target_fails_to_prepare() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "a file, not a directory").unwrap();
        let err = ExportTarget::prepare(&blocker.join("out.csv")).unwrap_err();
        assert!(matches!(err, ExportError::Prepare { .. }));
    }
}
