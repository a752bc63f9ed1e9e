//! Input reader adapters: CSV / JSON / spreadsheet files → `RawTable`
//!
//! The pipeline itself only sees the in-memory `RawTable`; these adapters
//! exist for the CLI and for callers that hold raw file bytes.
//!
//! ## JSON shapes
//!
//! - `[{...}, {...}]` - one row per object
//! - `{"data": [{...}], ...}` - the first field holding an array of objects
//! - `{...}` - a single row
//!
//! Header order is first-seen key order across all records.
//!
//! ## Spreadsheets
//!
//! `.xlsx`, `.xlsm`, `.xls` and `.ods` workbooks are read with calamine. Only
//! the first sheet is used and its first row is the header row. Date cells
//! arrive as Excel serials so the date normalizer sees the same value it
//! would for a numeric serial column.

use calamine::{open_workbook_auto, Data, Range, Reader};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::types::{Cell, RawTable};

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to read {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Spreadsheet error in {}: {}", .0.display(), .1)]
    Excel(PathBuf, String),

    #[error("Unsupported input format '{0}' (expected .csv, .json or .xlsx)")]
    UnsupportedFormat(String),

    #[error("Input contains no data rows")]
    Empty,
}

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
    Excel,
}

impl InputFormat {
    /// Format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "txt" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(Self::Excel),
            _ => Err(TableError::UnsupportedFormat(ext)),
        }
    }
}

/// Read a CSV, JSON or spreadsheet file chosen by extension.
pub fn read_path(path: &Path) -> Result<RawTable, TableError> {
    let format = InputFormat::from_path(path)?;
    let open = || std::fs::File::open(path).map_err(|e| TableError::Io(path.to_path_buf(), e));
    let table = match format {
        InputFormat::Csv => read_csv(open()?)?,
        InputFormat::Json => read_json(open()?)?,
        InputFormat::Excel => read_excel(path)?,
    };
    info!(
        path = %path.display(),
        columns = table.headers.len(),
        rows = table.len(),
        "Input table loaded"
    );
    Ok(table)
}

// ============================================================================
// CSV
// ============================================================================

/// Parse CSV with a header row. Cells stay text; short rows are padded.
pub fn read_csv<R: Read>(reader: R) -> Result<RawTable, TableError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let mut row: Vec<Cell> = record.iter().map(Cell::from).collect();
        if row.len() < headers.len() {
            row.resize(headers.len(), Cell::Empty);
        }
        rows.push(row);
    }

    finish(headers, rows)
}

// ============================================================================
// Spreadsheets
// ============================================================================

/// Read the first sheet of a workbook.
pub fn read_excel(path: &Path) -> Result<RawTable, TableError> {
    let excel_err = |e: calamine::Error| TableError::Excel(path.to_path_buf(), e.to_string());

    let mut workbook = open_workbook_auto(path).map_err(excel_err)?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Err(TableError::Empty);
    };
    let range = workbook.worksheet_range(&sheet).map_err(excel_err)?;
    let sheets = workbook.sheet_names().len();
    if sheets > 1 {
        warn!(sheet = %sheet, ignored = sheets - 1, "Only the first sheet is read");
    }
    from_excel_range(&range)
}

/// Build a table from a sheet range; the first row holds the headers.
pub fn from_excel_range(range: &Range<Data>) -> Result<RawTable, TableError> {
    let mut rows_iter = range.rows();
    let Some(header_row) = rows_iter.next() else {
        return Err(TableError::Empty);
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|c| c.to_string().trim().to_string())
        .collect();

    let rows = rows_iter
        .map(|row| row.iter().map(excel_cell).collect::<Vec<Cell>>())
        .filter(|row| !row.iter().all(Cell::is_blank))
        .collect();

    finish(headers, rows)
}

fn excel_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Float(f) => Cell::Number(*f),
        #[allow(clippy::cast_precision_loss)]
        Data::Int(i) => Cell::Number(*i as f64),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from(s.as_str()),
        Data::Bool(b) => Cell::Text(b.to_string()),
    }
}

// ============================================================================
// JSON
// ============================================================================

pub fn read_json<R: Read>(reader: R) -> Result<RawTable, TableError> {
    let value: Value = serde_json::from_reader(reader)?;
    from_json_value(&value)
}

pub fn read_json_str(text: &str) -> Result<RawTable, TableError> {
    let value: Value = serde_json::from_str(text)?;
    from_json_value(&value)
}

/// Build a table from an already parsed JSON document.
pub fn from_json_value(value: &Value) -> Result<RawTable, TableError> {
    let records: Vec<&serde_json::Map<String, Value>> = match value {
        Value::Array(items) => object_elements(items),
        Value::Object(map) => {
            let nested = map.values().find_map(|v| match v {
                Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
                    Some(items)
                }
                _ => None,
            });
            match nested {
                Some(items) => object_elements(items),
                None => vec![map],
            }
        }
        _ => Vec::new(),
    };

    let mut headers: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .map(|h| record.get(h).map_or(Cell::Empty, json_cell))
                .collect()
        })
        .collect();

    finish(headers, rows)
}

fn object_elements(items: &[Value]) -> Vec<&serde_json::Map<String, Value>> {
    let objects: Vec<_> = items.iter().filter_map(Value::as_object).collect();
    if objects.len() < items.len() {
        warn!(
            skipped = items.len() - objects.len(),
            "Ignoring non-object elements in JSON records array"
        );
    }
    objects
}

fn json_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Empty,
        Value::Number(n) => n.as_f64().map_or(Cell::Empty, Cell::Number),
        Value::String(s) => Cell::from(s.as_str()),
        Value::Bool(b) => Cell::Text(b.to_string()),
        other => Cell::Text(other.to_string()),
    }
}

fn finish(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<RawTable, TableError> {
    if headers.is_empty() || rows.is_empty() {
        return Err(TableError::Empty);
    }
    Ok(RawTable::new(headers, rows))
}
