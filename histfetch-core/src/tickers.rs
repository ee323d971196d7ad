//! Ticker list loading from a spreadsheet or CSV file.
//!
//! The input is a table with a header row; one column (by default `Symbol`)
//! names the instruments to fetch. Everything else in the file is ignored.
//! Rows come back in file order, duplicates included.

use calamine::{open_workbook_auto, Data, Reader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from reading the ticker source.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("ticker file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot read ticker file {}: {reason}", path.display())]
    FileFormat { path: PathBuf, reason: String },

    #[error("ticker file {} has no '{column}' column", path.display())]
    MissingColumn { path: PathBuf, column: String },
}

impl LoadError {
    fn format(path: &Path, reason: impl ToString) -> Self {
        LoadError::FileFormat {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Read the `column` values of the table at `path`, in row order.
///
/// `.csv` files are read as comma-separated text; `.xls`, `.xlsx`, `.xlsm`,
/// `.xlsb` and `.ods` are read from their first worksheet. Blank cells are
/// skipped.
pub fn load_tickers(path: &Path, column: &str) -> Result<Vec<String>, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    let cells = if is_csv {
        read_csv_column(path, column)?
    } else {
        read_sheet_column(path, column)?
    };

    let mut tickers = Vec::with_capacity(cells.len());
    for (row, cell) in cells.into_iter().enumerate() {
        let symbol = cell.trim();
        if symbol.is_empty() {
            // Row numbers are 1-based and count the header.
            tracing::warn!(row = row + 2, column, "skipping blank ticker cell");
            continue;
        }
        tickers.push(symbol.to_string());
    }

    tracing::info!(count = tickers.len(), path = %path.display(), "loaded tickers");
    Ok(tickers)
}

fn read_csv_column(path: &Path, column: &str) -> Result<Vec<String>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| LoadError::format(path, e))?;

    let headers = reader.headers().map_err(|e| LoadError::format(path, e))?;
    let idx = headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| LoadError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LoadError::format(path, e))?;
        values.push(record.get(idx).unwrap_or_default().to_string());
    }
    Ok(values)
}

fn read_sheet_column(path: &Path, column: &str) -> Result<Vec<String>, LoadError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| LoadError::format(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::format(path, "workbook has no worksheets"))?
        .map_err(|e| LoadError::format(path, e))?;

    let mut rows = range.rows();
    let idx = rows
        .next()
        .and_then(|header| {
            header
                .iter()
                .position(|cell| cell_text(cell).trim() == column)
        })
        .ok_or_else(|| LoadError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })?;

    Ok(rows
        .map(|row| row.get(idx).map(cell_text).unwrap_or_default())
        .collect())
}

/// Render a spreadsheet cell as identifier text. Integral floats lose the
/// trailing `.0` so numeric codes read the way they look in the sheet.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}
