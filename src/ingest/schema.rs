//! Schema Detector - maps arbitrary input columns to pipeline roles
//!
//! Each header is scored against a fixed synonym table per role:
//!
//! | Tier     | Rule                                                      |
//! |----------|-----------------------------------------------------------|
//! | Exact    | header tokens equal a synonym's tokens (case-insensitive)  |
//! | Partial  | a synonym's tokens appear contiguously in the header, or   |
//! |          | a synonym of 4+ characters is a substring of the header    |
//!
//! Content fit over the first rows breaks ties between name candidates:
//! the date role prefers columns that mostly parse as dates, the value role
//! prefers mostly numeric columns. Remaining ties are reported as
//! [`SchemaError::Ambiguous`] instead of guessed.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use super::dates::{looks_like_date, PLAUSIBLE_SERIAL_RANGE};
use super::records::parse_value;
use crate::config::defaults::{CONTENT_MAJORITY, SCHEMA_SAMPLE_ROWS};
use crate::types::{Cell, RawTable};

// ============================================================================
// Roles
// ============================================================================

/// Logical column role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Equipment,
    Kpi,
    Floor,
    Date,
    Value,
}

impl Role {
    /// Resolution order. Mandatory roles first so they claim contested
    /// columns before the optional ones.
    pub const RESOLUTION_ORDER: [Role; 5] = [
        Role::Equipment,
        Role::Date,
        Role::Value,
        Role::Kpi,
        Role::Floor,
    ];

    pub fn is_mandatory(self) -> bool {
        matches!(self, Role::Equipment | Role::Date | Role::Value)
    }

    /// Header synonyms for the role.
    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            Role::Equipment => &[
                "eq",
                "equipment",
                "equipment id",
                "equipment no",
                "unit",
                "unit id",
                "elevator",
                "elevator id",
                "lift",
                "lift id",
            ],
            Role::Kpi => &["ckpi", "kpi", "kpi name", "metric", "indicator", "parameter"],
            Role::Floor => &["floor", "level", "landing", "floor no"],
            Role::Date => &[
                "ckpi_statistics_date",
                "date",
                "statistics date",
                "timestamp",
                "day",
                "datetime",
            ],
            Role::Value => &["ave", "value", "reading", "average", "avg", "mean"],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Equipment => "equipment",
            Role::Kpi => "kpi",
            Role::Floor => "floor",
            Role::Date => "date",
            Role::Value => "value",
        };
        write!(f, "{name}")
    }
}

// ============================================================================
// Mapping / Errors
// ============================================================================

/// A resolved source column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub index: usize,
    pub header: String,
}

/// Role → source column mapping. Unmapped columns are ignored downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMapping {
    pub equipment: ColumnRef,
    /// `None` for single-metric files; the value header names the KPI
    pub kpi: Option<ColumnRef>,
    pub floor: Option<ColumnRef>,
    pub date: ColumnRef,
    pub value: ColumnRef,
}

impl SchemaMapping {
    pub fn get(&self, role: Role) -> Option<&ColumnRef> {
        match role {
            Role::Equipment => Some(&self.equipment),
            Role::Kpi => self.kpi.as_ref(),
            Role::Floor => self.floor.as_ref(),
            Role::Date => Some(&self.date),
            Role::Value => Some(&self.value),
        }
    }

    /// Source header for a role.
    pub fn header(&self, role: Role) -> Option<&str> {
        self.get(role).map(|c| c.header.as_str())
    }
}

impl fmt::Display for SchemaMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for role in [Role::Equipment, Role::Kpi, Role::Floor, Role::Date, Role::Value] {
            if let Some(col) = self.get(role) {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{role}=\"{}\"", col.header)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Batch-level schema failure; aborts the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Schema ambiguous: columns {columns:?} match the {role} role equally well")]
    Ambiguous { role: Role, columns: Vec<String> },

    #[error("Schema incomplete: no column found for {}", join_roles(.missing))]
    Incomplete { missing: Vec<Role> },
}

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Scoring
// ============================================================================

/// Name match tier; higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum NameMatch {
    Partial = 1,
    Exact = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct CandidateScore {
    name: NameMatch,
    content_fit: bool,
}

/// Lowercase alphanumeric tokens of a header.
fn tokens(header: &str) -> Vec<String> {
    header
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

fn name_match(header: &str, role: Role) -> Option<NameMatch> {
    let header_tokens = tokens(header);
    if header_tokens.is_empty() {
        return None;
    }
    let header_compact = header_tokens.concat();

    let mut best: Option<NameMatch> = None;
    for synonym in role.synonyms() {
        let syn_tokens = tokens(synonym);
        let syn_compact = syn_tokens.concat();

        let tier = if header_tokens == syn_tokens || header_compact == syn_compact {
            Some(NameMatch::Exact)
        } else if header_tokens
            .windows(syn_tokens.len())
            .any(|w| w == syn_tokens.as_slice())
            || (syn_compact.len() >= 4 && header_compact.contains(&syn_compact))
        {
            Some(NameMatch::Partial)
        } else {
            None
        };
        best = best.max(tier);
        if best == Some(NameMatch::Exact) {
            break;
        }
    }
    best
}

/// Share of non-blank sample cells accepted by `pred`; `None` when every
/// sampled cell is blank.
fn content_share<F>(table: &RawTable, column: usize, pred: F) -> Option<f64>
where
    F: Fn(&Cell) -> bool,
{
    let mut seen = 0usize;
    let mut hits = 0usize;
    for cell in table.column_sample(column, SCHEMA_SAMPLE_ROWS) {
        if cell.is_blank() {
            continue;
        }
        seen += 1;
        if pred(cell) {
            hits += 1;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let share = (seen > 0).then(|| hits as f64 / seen as f64);
    share
}

fn is_date_like(cell: &Cell) -> bool {
    match cell {
        // Plausible Excel serials (1954-2119)
        Cell::Number(n) => PLAUSIBLE_SERIAL_RANGE.contains(n),
        _ => looks_like_date(cell),
    }
}

fn is_numeric(cell: &Cell) -> bool {
    !looks_like_date(cell) && parse_value(cell).is_some()
}

fn content_fit(table: &RawTable, column: usize, role: Role) -> bool {
    let share = match role {
        Role::Date => content_share(table, column, is_date_like),
        Role::Value => content_share(table, column, is_numeric),
        _ => return false,
    };
    share.is_some_and(|s| s >= CONTENT_MAJORITY)
}

// ============================================================================
// Detection (entry point)
// ============================================================================

/// Resolve the role mapping for a table.
///
/// Columns that exactly match one role are never offered to another.
/// Within a role the best `(name tier, content fit)` wins; an equal best
/// pair between two columns is `Ambiguous`. Missing equipment, date or
/// value is `Incomplete`.
pub fn detect_schema(table: &RawTable) -> Result<SchemaMapping, SchemaError> {
    let headers = &table.headers;

    // Columns claimed by an exact name match, per role
    let exact_owner: Vec<Option<Role>> = headers
        .iter()
        .map(|h| {
            Role::RESOLUTION_ORDER
                .into_iter()
                .find(|&role| name_match(h, role) == Some(NameMatch::Exact))
        })
        .collect();

    let mut assigned: Vec<Option<Role>> = vec![None; headers.len()];
    let mut resolved: Vec<(Role, ColumnRef)> = Vec::new();
    let mut missing: Vec<Role> = Vec::new();

    for role in Role::RESOLUTION_ORDER {
        let mut candidates: Vec<(CandidateScore, usize)> = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| assigned[*idx].is_none())
            .filter(|(idx, _)| exact_owner[*idx].map_or(true, |owner| owner == role))
            .filter_map(|(idx, header)| {
                name_match(header, role).map(|name| {
                    let score = CandidateScore {
                        name,
                        content_fit: content_fit(table, idx, role),
                    };
                    (score, idx)
                })
            })
            .collect();

        // Best first; column order keeps the result deterministic
        candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let Some(&(best_score, best_idx)) = candidates.first() else {
            if role.is_mandatory() {
                missing.push(role);
            }
            continue;
        };

        let tied: Vec<String> = candidates
            .iter()
            .take_while(|(score, _)| *score == best_score)
            .map(|(_, idx)| headers[*idx].clone())
            .collect();
        if tied.len() > 1 {
            return Err(SchemaError::Ambiguous {
                role,
                columns: tied,
            });
        }

        debug!(
            role = %role,
            column = %headers[best_idx],
            exact = best_score.name == NameMatch::Exact,
            content_fit = best_score.content_fit,
            "Schema role resolved"
        );
        assigned[best_idx] = Some(role);
        resolved.push((
            role,
            ColumnRef {
                index: best_idx,
                header: headers[best_idx].clone(),
            },
        ));
    }

    if !missing.is_empty() {
        return Err(SchemaError::Incomplete { missing });
    }

    let take = |role: Role| {
        resolved
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, c)| c.clone())
    };
    let (Some(equipment), Some(date), Some(value)) =
        (take(Role::Equipment), take(Role::Date), take(Role::Value))
    else {
        return Err(SchemaError::Incomplete {
            missing: vec![Role::Equipment, Role::Date, Role::Value],
        });
    };

    let mapping = SchemaMapping {
        equipment,
        kpi: take(Role::Kpi),
        floor: take(Role::Floor),
        date,
        value,
    };
    info!(
        mapping = %mapping,
        ignored_columns = headers.len() - resolved.len(),
        "Schema detected"
    );
    Ok(mapping)
}
