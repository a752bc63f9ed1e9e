//! Record building: raw rows → typed `Reading`s plus row diagnostics
//!
//! Rows that cannot produce a finite value, a calendar date, an equipment id
//! or a KPI name are dropped and recorded. Nothing is coerced to zero.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use super::dates::{normalize_cell, DateOrder, DateParseError};
use super::schema::{Role, SchemaMapping};
use crate::types::{Cell, RawTable, Reading};

/// Why a row was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowError {
    #[error("DateUnparseable: '{raw}' ({reason})")]
    DateUnparseable { raw: String, reason: DateParseError },

    #[error("ValueUnparseable: '{raw}'")]
    ValueUnparseable { raw: String },

    #[error("MissingField: empty {role} cell")]
    MissingField { role: Role },
}

impl RowError {
    /// Short category name used for grouping in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            RowError::DateUnparseable { .. } => "DateUnparseable",
            RowError::ValueUnparseable { .. } => "ValueUnparseable",
            RowError::MissingField { .. } => "MissingField",
        }
    }
}

/// A dropped row. `row` is the zero-based data row index (header excluded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDiagnostic {
    pub row: usize,
    pub error: RowError,
}

impl fmt::Display for RowDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.error)
    }
}

/// Row-level outcome of one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub total_rows: usize,
    pub accepted_rows: usize,
    pub skipped: Vec<RowDiagnostic>,
}

impl Diagnostics {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Skipped rows per error kind.
    pub fn reason_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for d in &self.skipped {
            *counts.entry(d.error.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// `"N rows skipped, reasons: DateUnparseable (2), ValueUnparseable (1)"`
    pub fn summary(&self) -> String {
        if self.skipped.is_empty() {
            return "0 rows skipped".to_string();
        }
        let reasons = self
            .reason_counts()
            .into_iter()
            .map(|(kind, n)| format!("{kind} ({n})"))
            .collect::<Vec<_>>()
            .join(", ");
        let noun = if self.skipped.len() == 1 { "row" } else { "rows" };
        format!("{} {noun} skipped, reasons: {reasons}", self.skipped.len())
    }
}

/// Parse a numeric cell. Text is trimmed; NaN and infinities are rejected.
pub fn parse_value(cell: &Cell) -> Option<f64> {
    let v = match cell {
        Cell::Number(n) => *n,
        Cell::Text(s) => s.trim().parse::<f64>().ok()?,
        Cell::Empty => return None,
    };
    v.is_finite().then_some(v)
}

/// Convert every row of `table` using `mapping`.
///
/// When the mapping has no KPI column the value column's header names the
/// KPI of every reading.
pub fn build_readings(
    table: &RawTable,
    mapping: &SchemaMapping,
    order: DateOrder,
) -> (Vec<Reading>, Diagnostics) {
    let mut readings = Vec::with_capacity(table.len());
    let mut diagnostics = Diagnostics {
        total_rows: table.len(),
        ..Diagnostics::default()
    };

    for row in 0..table.len() {
        match build_row(table, mapping, order, row) {
            Ok(reading) => readings.push(reading),
            Err(error) => {
                debug!(row, error = %error, "Row dropped");
                diagnostics.skipped.push(RowDiagnostic { row, error });
            }
        }
    }
    diagnostics.accepted_rows = readings.len();

    if !diagnostics.is_clean() {
        warn!(
            skipped = diagnostics.skipped_count(),
            total = diagnostics.total_rows,
            "{}",
            diagnostics.summary()
        );
    }

    (readings, diagnostics)
}

fn build_row(
    table: &RawTable,
    mapping: &SchemaMapping,
    order: DateOrder,
    row: usize,
) -> Result<Reading, RowError> {
    let equipment_id = table
        .cell(row, mapping.equipment.index)
        .to_text()
        .ok_or(RowError::MissingField {
            role: Role::Equipment,
        })?;

    let kpi = match &mapping.kpi {
        Some(col) => table
            .cell(row, col.index)
            .to_text()
            .ok_or(RowError::MissingField { role: Role::Kpi })?,
        None => mapping.value.header.trim().to_string(),
    };

    let floor = mapping
        .floor
        .as_ref()
        .and_then(|col| table.cell(row, col.index).to_text());

    let date_cell = table.cell(row, mapping.date.index);
    let date = normalize_cell(date_cell, order).map_err(|reason| RowError::DateUnparseable {
        raw: date_cell.to_string(),
        reason,
    })?;

    let value_cell = table.cell(row, mapping.value.index);
    let value = parse_value(value_cell).ok_or_else(|| RowError::ValueUnparseable {
        raw: value_cell.to_string(),
    })?;

    Ok(Reading {
        equipment_id,
        kpi,
        floor,
        date,
        value,
    })
}
