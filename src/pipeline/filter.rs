//! Reading selection by equipment, floor, KPI and date range.
//!
//! Empty selection lists accept everything. Date ranges are inclusive on
//! both ends and presets are anchored on the latest date in the data, not
//! on today.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::{normalize_kpi_name, SeriesKey};

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Named look-back windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RangePreset {
    Week,
    Month,
    Quarter,
    HalfYear,
    Year,
}

impl RangePreset {
    pub fn days(self) -> u64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
            Self::HalfYear => 180,
            Self::Year => 365,
        }
    }
}

impl DateRange {
    /// Range from `start` to `end`; the bounds are swapped when reversed.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// `latest - preset.days()` through `latest`.
    pub fn preset(latest: NaiveDate, preset: RangePreset) -> Self {
        let start = latest
            .checked_sub_days(Days::new(preset.days()))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: latest }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Selection applied to classified series.
///
/// KPI names are compared after [`normalize_kpi_name`], so `"Door Friction"`
/// selects the `doorfriction` series. Aliases are not resolved here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingFilter {
    pub equipment: Vec<String>,
    pub floors: Vec<String>,
    pub kpis: Vec<String>,
    pub range: Option<DateRange>,
}

impl ReadingFilter {
    pub fn is_empty(&self) -> bool {
        self.equipment.is_empty()
            && self.floors.is_empty()
            && self.kpis.is_empty()
            && self.range.is_none()
    }

    /// Series-level check on equipment, floor and KPI.
    pub fn accepts_key(&self, key: &SeriesKey) -> bool {
        let equipment_ok =
            self.equipment.is_empty() || self.equipment.iter().any(|e| *e == key.equipment_id);
        let floor_ok = self.floors.is_empty()
            || key
                .floor
                .as_ref()
                .is_some_and(|f| self.floors.iter().any(|sel| sel == f));
        let kpi_ok = self.kpis.is_empty()
            || self.kpis.iter().any(|k| normalize_kpi_name(k) == key.kpi);
        equipment_ok && floor_ok && kpi_ok
    }

    pub fn accepts_date(&self, date: NaiveDate) -> bool {
        self.range.map_or(true, |r| r.contains(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn key(eq: &str, kpi: &str, floor: Option<&str>) -> SeriesKey {
        SeriesKey {
            equipment_id: eq.into(),
            kpi: kpi.into(),
            floor: floor.map(Into::into),
        }
    }

    #[test]
    fn test_preset_windows() {
        let latest = date(2024, 3, 31);
        assert_eq!(DateRange::preset(latest, RangePreset::Week).start, date(2024, 3, 24));
        assert_eq!(DateRange::preset(latest, RangePreset::Month).start, date(2024, 3, 1));
        assert_eq!(DateRange::preset(latest, RangePreset::Year).start, date(2023, 4, 1));
        assert_eq!(DateRange::preset(latest, RangePreset::Quarter).end, latest);
    }

    #[test]
    fn test_range_is_inclusive_and_ordered() {
        let r = DateRange::new(date(2024, 2, 10), date(2024, 2, 1));
        assert_eq!(r.start, date(2024, 2, 1));
        assert!(r.contains(date(2024, 2, 1)));
        assert!(r.contains(date(2024, 2, 10)));
        assert!(!r.contains(date(2024, 2, 11)));
    }

    #[test]
    fn test_empty_filter_accepts_everything() {
        let f = ReadingFilter::default();
        assert!(f.is_empty());
        assert!(f.accepts_key(&key("L1", "doorfriction", None)));
        assert!(f.accepts_date(date(1999, 1, 1)));
    }

    #[test]
    fn test_selection_lists() {
        let f = ReadingFilter {
            equipment: vec!["L1".into()],
            floors: vec!["3".into()],
            kpis: vec!["Door Friction".into()],
            range: None,
        };
        assert!(f.accepts_key(&key("L1", "doorfriction", Some("3"))));
        assert!(!f.accepts_key(&key("L2", "doorfriction", Some("3"))));
        assert!(!f.accepts_key(&key("L1", "doorfriction", Some("4"))));
        assert!(!f.accepts_key(&key("L1", "doorfriction", None)));
        assert!(!f.accepts_key(&key("L1", "lockhooktime", Some("3"))));
    }
}
