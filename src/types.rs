//! Shared data structures for CKPI trend and anomaly analysis
//!
//! This module defines the core types for the analysis pipeline:
//! - Ingestion: RawTable / Cell (what the input reader hands over)
//! - Normalization: Reading (one numeric KPI observation)
//! - Classification: ReadingStatus, ClassifiedReading
//! - Thresholds: ThresholdBand, ThresholdTable, WeightTable
//! - Scoring: EquipmentHealthScore, KpiContribution, HealthStatus

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Raw Input
// ============================================================================

/// A single raw cell as delivered by the input reader.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// True for `Empty` and for text that is blank after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Render the cell as trimmed text. Integral numbers drop the fraction
    /// so a floor stored as `3.0` becomes `"3"`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            Cell::Number(n) => Some(format_number(*n)),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => write!(f, ""),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Number(n) => write!(f, "{}", format_number(*n)),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Header list plus rows of raw cells. Rows may be shorter than the header;
/// missing trailing cells read as `Cell::Empty`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

static EMPTY_CELL: Cell = Cell::Empty;

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (row, column), `Cell::Empty` when out of range.
    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Iterate the first `limit` cells of a column.
    pub fn column_sample(&self, column: usize, limit: usize) -> impl Iterator<Item = &Cell> + '_ {
        (0..self.rows.len().min(limit)).map(move |row| self.cell(row, column))
    }
}

// ============================================================================
// Readings
// ============================================================================

/// One normalized KPI observation.
///
/// `value` is always finite: rows whose value cannot be parsed are dropped
/// during ingestion with a recorded reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub equipment_id: String,
    pub kpi: String,
    pub floor: Option<String>,
    pub date: NaiveDate,
    pub value: f64,
}

/// Series identity used for extremum detection and insights.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub equipment_id: String,
    /// Canonical (normalized, alias-resolved) KPI key
    pub kpi: String,
    pub floor: Option<String>,
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.floor {
            Some(floor) => write!(f, "{} / {} / floor {}", self.equipment_id, self.kpi, floor),
            None => write!(f, "{} / {}", self.equipment_id, self.kpi),
        }
    }
}

// ============================================================================
// Classification Status
// ============================================================================

/// Which side of the threshold band was breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachSide {
    Low,
    High,
}

/// Result of comparing a value with its KPI's threshold band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "side")]
pub enum LimitStatus {
    WithinLimits,
    OutsideLimits(BreachSide),
    /// KPI has no threshold band
    Unclassified,
}

/// Local extremum flag from the peak/low detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extremum {
    Peak,
    Low,
}

/// Individual status flag; a reading carries a set of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFlag {
    WithinLimits,
    OutsideLimits,
    Peak,
    Low,
    Unclassified,
}

impl fmt::Display for StatusFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFlag::WithinLimits => write!(f, "within_limits"),
            StatusFlag::OutsideLimits => write!(f, "outside_limits"),
            StatusFlag::Peak => write!(f, "peak"),
            StatusFlag::Low => write!(f, "low"),
            StatusFlag::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// Limit classification and statistical extremum are independent: a reading
/// may be `within_limits` and a `peak` at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingStatus {
    pub limit: LimitStatus,
    pub extremum: Option<Extremum>,
}

impl ReadingStatus {
    pub fn new(limit: LimitStatus) -> Self {
        Self {
            limit,
            extremum: None,
        }
    }

    /// The set of flags that apply, limit flag first.
    pub fn flags(&self) -> Vec<StatusFlag> {
        let mut flags = Vec::with_capacity(2);
        flags.push(match self.limit {
            LimitStatus::WithinLimits => StatusFlag::WithinLimits,
            LimitStatus::OutsideLimits(_) => StatusFlag::OutsideLimits,
            LimitStatus::Unclassified => StatusFlag::Unclassified,
        });
        match self.extremum {
            Some(Extremum::Peak) => flags.push(StatusFlag::Peak),
            Some(Extremum::Low) => flags.push(StatusFlag::Low),
            None => {}
        }
        flags
    }

    pub fn has(&self, flag: StatusFlag) -> bool {
        self.flags().contains(&flag)
    }
}

/// A reading together with its status flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedReading {
    #[serde(flatten)]
    pub reading: Reading,
    pub status: ReadingStatus,
}

impl ClassifiedReading {
    pub fn is_peak(&self) -> bool {
        self.status.extremum == Some(Extremum::Peak)
    }

    pub fn is_low(&self) -> bool {
        self.status.extremum == Some(Extremum::Low)
    }

    pub fn is_outside_limits(&self) -> bool {
        matches!(self.status.limit, LimitStatus::OutsideLimits(_))
    }
}

// ============================================================================
// Threshold and Weight Tables
// ============================================================================

/// Normalize a KPI name for matching: lowercase ASCII alphanumerics only.
///
/// `"Door Friction"`, `"doorFriction"` and `"door_friction"` all map to
/// `"doorfriction"`.
pub fn normalize_kpi_name(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Normal operating range for one KPI. Either bound may be open, never both.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBand {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl ThresholdBand {
    pub fn new(low: f64, high: f64) -> Self {
        Self {
            low: Some(low),
            high: Some(high),
        }
    }

    pub fn at_least(low: f64) -> Self {
        Self {
            low: Some(low),
            high: None,
        }
    }

    pub fn at_most(high: f64) -> Self {
        Self {
            low: None,
            high: Some(high),
        }
    }

    pub fn is_two_sided(&self) -> bool {
        self.low.is_some() && self.high.is_some()
    }

    /// Midpoint of a two-sided band.
    pub fn center(&self) -> Option<f64> {
        match (self.low, self.high) {
            (Some(lo), Some(hi)) => Some((lo + hi) / 2.0),
            _ => None,
        }
    }
}

/// Immutable KPI → threshold band lookup with alias resolution.
///
/// Built once from configuration and shared by reference; safe for
/// unsynchronized concurrent reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdTable {
    bands: HashMap<String, ThresholdBand>,
    aliases: HashMap<String, String>,
}

impl ThresholdTable {
    /// Build from `(name, band)` pairs and `(alias, name)` pairs. Names and
    /// aliases are normalized with [`normalize_kpi_name`].
    pub fn new<B, A>(bands: B, aliases: A) -> Self
    where
        B: IntoIterator<Item = (String, ThresholdBand)>,
        A: IntoIterator<Item = (String, String)>,
    {
        Self {
            bands: bands
                .into_iter()
                .map(|(k, v)| (normalize_kpi_name(&k), v))
                .collect(),
            aliases: aliases
                .into_iter()
                .map(|(alias, target)| (normalize_kpi_name(&alias), normalize_kpi_name(&target)))
                .collect(),
        }
    }

    /// Canonical key for a raw KPI name: alias target if one exists,
    /// otherwise the normalized name itself.
    pub fn canonical_key(&self, kpi: &str) -> String {
        let key = normalize_kpi_name(kpi);
        self.aliases.get(&key).cloned().unwrap_or(key)
    }

    pub fn get(&self, kpi: &str) -> Option<&ThresholdBand> {
        self.bands.get(&self.canonical_key(kpi))
    }

    pub fn contains(&self, kpi: &str) -> bool {
        self.get(kpi).is_some()
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

/// Immutable canonical KPI key → weight lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightTable {
    weights: HashMap<String, f64>,
}

impl WeightTable {
    pub fn new<W>(weights: W) -> Self
    where
        W: IntoIterator<Item = (String, f64)>,
    {
        Self {
            weights: weights
                .into_iter()
                .map(|(k, v)| (normalize_kpi_name(&k), v))
                .collect(),
        }
    }

    /// Weight for a canonical KPI key (see [`ThresholdTable::canonical_key`]).
    pub fn get(&self, canonical_kpi: &str) -> Option<f64> {
        self.weights.get(canonical_kpi).copied()
    }
}

// ============================================================================
// Health Scoring
// ============================================================================

/// One KPI's contribution to an equipment health score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiContribution {
    /// Canonical KPI key
    pub kpi: String,
    pub weight: f64,
    /// Position inside / outside the band mapped to [0, 1]
    pub normalized_value: f64,
    /// Value the normalization was computed from
    pub value: f64,
    /// Date of the most recent reading used
    pub date: NaiveDate,
}

/// Overall standing bucket for an equipment score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Excellent,
    NeedsMonitoring,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Excellent => write!(f, "Excellent"),
            HealthStatus::NeedsMonitoring => write!(f, "Needs Monitoring"),
            HealthStatus::Critical => write!(f, "Critical"),
        }
    }
}

/// Weighted 0-100 summary of one equipment's KPI standing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentHealthScore {
    pub equipment_id: String,
    pub score: f64,
    pub status: HealthStatus,
    /// Ordered by canonical KPI key
    pub contributing_kpis: Vec<KpiContribution>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_kpi_name_variants() {
        assert_eq!(normalize_kpi_name("Door Friction"), "doorfriction");
        assert_eq!(normalize_kpi_name("doorFriction"), "doorfriction");
        assert_eq!(normalize_kpi_name(" door_friction "), "doorfriction");
    }

    #[test]
    fn test_cell_to_text_integral_number() {
        assert_eq!(Cell::Number(3.0).to_text().as_deref(), Some("3"));
        assert_eq!(Cell::Number(2.5).to_text().as_deref(), Some("2.5"));
        assert_eq!(Cell::Text("  ".into()).to_text(), None);
        assert!(Cell::Empty.is_blank());
    }

    #[test]
    fn test_raw_table_out_of_range_cell_is_empty() {
        let table = RawTable::new(vec!["a".into(), "b".into()], vec![vec![Cell::from("x")]]);
        assert_eq!(table.cell(0, 1), &Cell::Empty);
        assert_eq!(table.cell(5, 0), &Cell::Empty);
    }

    #[test]
    fn test_threshold_table_alias_resolution() {
        let table = ThresholdTable::new(
            vec![("lockHookTime".to_string(), ThresholdBand::at_least(0.3))],
            vec![(
                "Landing Door Lock Hook Open Time".to_string(),
                "lockHookTime".to_string(),
            )],
        );
        assert_eq!(
            table.canonical_key("Landing Door Lock Hook Open Time"),
            "lockhooktime"
        );
        assert!(table.contains("LOCK_HOOK_TIME"));
        assert!(!table.contains("unknown"));
    }

    #[test]
    fn test_status_flags_combine_limit_and_extremum() {
        let status = ReadingStatus {
            limit: LimitStatus::WithinLimits,
            extremum: Some(Extremum::Peak),
        };
        assert_eq!(status.flags(), vec![StatusFlag::WithinLimits, StatusFlag::Peak]);
        assert!(status.has(StatusFlag::Peak));
        assert!(!status.has(StatusFlag::OutsideLimits));
    }
}
