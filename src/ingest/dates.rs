//! Date normalization for heterogeneous KPI exports.
//!
//! Accepted inputs, tried in this order:
//! 1. ISO `yyyy-mm-dd` (also `yyyy/mm/dd`), optional time suffix ignored
//! 2. Day/month forms `dd/mm/yyyy`, `mm/dd/yyyy` with `/`, `.` or `-`
//! 3. Excel serial day numbers (1899-12-30 epoch); as text only within
//!    [`PLAUSIBLE_SERIAL_RANGE`], so stray small numbers are not read as 1900 dates
//!
//! When a day/month string reads validly both ways (`03/04/2024`), the
//! configured [`DateOrder`] decides. All functions are pure.

use chrono::{Days, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

use crate::types::Cell;

/// Largest Excel serial accepted (9999-12-31).
pub const EXCEL_SERIAL_MAX: f64 = 2_958_465.0;

/// Serials accepted from text cells and treated as date-like by schema
/// detection (1954-09-26 through 2119-01-11).
pub const PLAUSIBLE_SERIAL_RANGE: std::ops::RangeInclusive<f64> = 20_000.0..=80_000.0;

/// Preferred reading of an ambiguous day/month date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    #[default]
    DayFirst,
    MonthFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum DateParseError {
    #[error("empty date")]
    Empty,

    #[error("unrecognized date format: '{0}'")]
    Unrecognized(String),

    #[error("not a valid calendar date: '{0}'")]
    InvalidDate(String),

    #[error("Excel serial out of range: {0}")]
    SerialOutOfRange(String),
}

#[allow(clippy::unwrap_used)]
fn iso_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})(?:[T ]\d{1,2}:\d{2}.*)?$").unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn day_month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})([/.\-])(\d{1,2})([/.\-])(\d{4})(?:[T ]\d{1,2}:\d{2}.*)?$")
            .unwrap()
    })
}

/// Parse a raw date string into a calendar date.
pub fn normalize_date(raw: &str, order: DateOrder) -> Result<NaiveDate, DateParseError> {
    let s = raw.trim().trim_matches('"');
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
        return Err(DateParseError::Empty);
    }

    if let Some(caps) = iso_re().captures(s) {
        let (y, m, d) = (num(&caps[1]), num(&caps[2]), num(&caps[3]));
        return ymd(y, m, d).ok_or_else(|| DateParseError::InvalidDate(s.to_string()));
    }

    if let Some(caps) = day_month_re().captures(s) {
        // Mixed separators ("03/04-2024") are not a date
        if caps[2] != caps[4] {
            return Err(DateParseError::Unrecognized(s.to_string()));
        }
        let (a, b, y) = (num(&caps[1]), num(&caps[3]), num(&caps[5]));
        let day_first = ymd(y, b, a);
        let month_first = ymd(y, a, b);
        return match (day_first, month_first) {
            (Some(dmy), Some(mdy)) => Ok(match order {
                DateOrder::DayFirst => dmy,
                DateOrder::MonthFirst => mdy,
            }),
            (Some(date), None) | (None, Some(date)) => Ok(date),
            (None, None) => Err(DateParseError::InvalidDate(s.to_string())),
        };
    }

    if let Ok(serial) = s.parse::<f64>() {
        if PLAUSIBLE_SERIAL_RANGE.contains(&serial) {
            return excel_serial_to_date(serial);
        }
    }

    Err(DateParseError::Unrecognized(s.to_string()))
}

/// Parse a raw cell: numbers are Excel serials, text goes through
/// [`normalize_date`].
pub fn normalize_cell(cell: &Cell, order: DateOrder) -> Result<NaiveDate, DateParseError> {
    match cell {
        Cell::Empty => Err(DateParseError::Empty),
        Cell::Number(n) => excel_serial_to_date(*n),
        Cell::Text(s) => normalize_date(s, order),
    }
}

/// Convert an Excel serial day number; any time fraction is discarded.
pub fn excel_serial_to_date(serial: f64) -> Result<NaiveDate, DateParseError> {
    if !serial.is_finite() || !(1.0..=EXCEL_SERIAL_MAX).contains(&serial) {
        return Err(DateParseError::SerialOutOfRange(serial.to_string()));
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .ok_or_else(|| DateParseError::SerialOutOfRange(serial.to_string()))?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let days = serial.floor() as u64;
    epoch
        .checked_add_days(Days::new(days))
        .ok_or_else(|| DateParseError::SerialOutOfRange(serial.to_string()))
}

/// True when a cell would normalize to a date. Used by schema content checks.
pub fn looks_like_date(cell: &Cell) -> bool {
    match cell {
        Cell::Text(s) => {
            let s = s.trim();
            (iso_re().is_match(s) || day_month_re().is_match(s))
                && normalize_date(s, DateOrder::DayFirst).is_ok()
        }
        _ => false,
    }
}

fn num(digits: &str) -> u32 {
    digits.parse().unwrap_or(0)
}

fn ymd(year: u32, month: u32, day: u32) -> Option<NaiveDate> {
    i32::try_from(year)
        .ok()
        .and_then(|y| NaiveDate::from_ymd_opt(y, month, day))
}
