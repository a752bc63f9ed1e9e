//! Peak/Low Detector
//!
//! A point is a peak when it exceeds both immediate neighbours by more than
//! the margin, a low when it is below both by more than the margin:
//!
//! ```text
//! margin = max(std_fraction × σ_population(series), min_margin)
//! peak:  v[i] - v[i-1] > margin  &&  v[i] - v[i+1] > margin
//! low:   v[i-1] - v[i] > margin  &&  v[i+1] - v[i] > margin
//! ```
//!
//! First and last points have a missing neighbour and are never flagged.
//! Equal consecutive values never qualify (the comparison is strict).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::cmp::Ordering;

use crate::config::defaults::{DEFAULT_MIN_MARGIN, DEFAULT_SENSITIVITY};
use crate::types::Extremum;

/// Margin rule for extremum detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sensitivity {
    /// Multiple of the series population standard deviation
    pub std_fraction: f64,
    /// Absolute lower bound on the margin
    pub min_margin: f64,
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self {
            std_fraction: DEFAULT_SENSITIVITY,
            min_margin: DEFAULT_MIN_MARGIN,
        }
    }
}

impl Sensitivity {
    /// Fixed margin independent of the series spread.
    pub fn absolute(margin: f64) -> Self {
        Self {
            std_fraction: 0.0,
            min_margin: margin,
        }
    }

    /// Margin for a concrete series.
    pub fn margin_for(&self, values: &[f64]) -> f64 {
        let sigma = if values.len() < 2 {
            0.0
        } else {
            values.iter().population_std_dev()
        };
        let scaled = if sigma.is_finite() {
            self.std_fraction * sigma
        } else {
            0.0
        };
        scaled.max(self.min_margin)
    }
}

/// A flagged index into the caller's series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedPoint {
    pub index: usize,
    pub kind: Extremum,
}

/// Flag local peaks and lows in a dated series.
///
/// The series is evaluated in (date, value) order, so callers may pass it in
/// any order, duplicate dates included; returned indices refer to the input
/// slice and are ascending.
pub fn detect_extrema(series: &[(NaiveDate, f64)], sensitivity: Sensitivity) -> Vec<FlaggedPoint> {
    let mut order: Vec<usize> = (0..series.len()).collect();
    order.sort_by(|&a, &b| series_order(&series[a], &series[b]));

    let values: Vec<f64> = order.iter().map(|&i| series[i].1).collect();
    let mut flagged: Vec<FlaggedPoint> = detect_extrema_in_values(&values, sensitivity)
        .into_iter()
        .map(|p| FlaggedPoint {
            index: order[p.index],
            kind: p.kind,
        })
        .collect();
    flagged.sort_by_key(|p| p.index);
    flagged
}

/// Total order used to evaluate a series: date, then value.
pub fn series_order(a: &(NaiveDate, f64), b: &(NaiveDate, f64)) -> Ordering {
    a.0.cmp(&b.0).then(a.1.total_cmp(&b.1))
}

/// Flag local peaks and lows in an already ordered value sequence.
pub fn detect_extrema_in_values(values: &[f64], sensitivity: Sensitivity) -> Vec<FlaggedPoint> {
    if values.len() < 3 {
        return Vec::new();
    }
    let margin = sensitivity.margin_for(values);

    values
        .windows(3)
        .enumerate()
        .filter_map(|(i, w)| {
            let (prev, cur, next) = (w[0], w[1], w[2]);
            let kind = if cur - prev > margin && cur - next > margin {
                Extremum::Peak
            } else if prev - cur > margin && next - cur > margin {
                Extremum::Low
            } else {
                return None;
            };
            Some(FlaggedPoint { index: i + 1, kind })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn series(values: &[f64]) -> Vec<(NaiveDate, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (day(u32::try_from(i).unwrap() + 1), *v))
            .collect()
    }

    #[test]
    fn test_single_peak_middle() {
        let flagged = detect_extrema(&series(&[10.0, 50.0, 12.0]), Sensitivity::default());
        assert_eq!(
            flagged,
            vec![FlaggedPoint {
                index: 1,
                kind: Extremum::Peak
            }]
        );
    }

    #[test]
    fn test_low_detected() {
        let flagged =
            detect_extrema_in_values(&[5.0, 5.2, 1.0, 5.1, 5.0], Sensitivity::absolute(0.5));
        assert_eq!(
            flagged,
            vec![FlaggedPoint {
                index: 2,
                kind: Extremum::Low
            }]
        );
    }

    #[test]
    fn test_empty_and_short_series() {
        assert!(detect_extrema(&[], Sensitivity::default()).is_empty());
        assert!(detect_extrema(&series(&[1.0]), Sensitivity::default()).is_empty());
        assert!(detect_extrema(&series(&[1.0, 9.0]), Sensitivity::default()).is_empty());
    }

    #[test]
    fn test_monotonic_never_flagged() {
        let rising: Vec<f64> = (0..20).map(|i| f64::from(i) * 1.7).collect();
        assert!(detect_extrema_in_values(&rising, Sensitivity::absolute(0.0)).is_empty());
        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        assert!(detect_extrema_in_values(&falling, Sensitivity::absolute(0.0)).is_empty());
    }

    #[test]
    fn test_ties_not_flagged() {
        let flagged =
            detect_extrema_in_values(&[1.0, 5.0, 5.0, 1.0], Sensitivity::absolute(0.0));
        assert!(flagged.is_empty());
    }

    #[test]
    fn test_edges_never_flagged() {
        let flagged =
            detect_extrema_in_values(&[100.0, 1.0, 2.0, 1.0, -100.0], Sensitivity::absolute(0.0));
        let indices: Vec<usize> = flagged.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn test_margin_suppresses_small_wiggles() {
        let values = [10.0, 10.4, 10.0, 30.0, 10.0];
        let loose = detect_extrema_in_values(&values, Sensitivity::absolute(0.1));
        let strict = detect_extrema_in_values(&values, Sensitivity::absolute(1.0));
        assert_eq!(loose.len(), 3);
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].index, 3);
    }

    #[test]
    fn test_margin_uses_population_std() {
        let s = Sensitivity {
            std_fraction: 1.0,
            min_margin: 0.0,
        };
        // population σ of [2, 4, 4, 4, 5, 5, 7, 9] is exactly 2
        let margin = s.margin_for(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((margin - 2.0).abs() < 1e-12);
        assert!((Sensitivity::absolute(3.0).margin_for(&[1.0, 2.0]) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_unsorted_input_matches_sorted() {
        let sorted = series(&[10.0, 50.0, 12.0, 11.0, 1.0, 12.0]);
        let mut shuffled = sorted.clone();
        shuffled.swap(0, 5);
        shuffled.swap(1, 3);

        let expected: Vec<(NaiveDate, Extremum)> = detect_extrema(&sorted, Sensitivity::default())
            .into_iter()
            .map(|p| (sorted[p.index].0, p.kind))
            .collect();
        let mut actual: Vec<(NaiveDate, Extremum)> =
            detect_extrema(&shuffled, Sensitivity::default())
                .into_iter()
                .map(|p| (shuffled[p.index].0, p.kind))
                .collect();
        actual.sort_by_key(|(d, _)| *d);
        assert_eq!(actual, expected);
        assert!(!expected.is_empty());
    }

    #[test]
    fn test_duplicate_dates_order_independent() {
        let a = vec![(day(1), 0.0), (day(2), 10.0), (day(2), 0.0), (day(3), 10.0)];
        let b = vec![(day(1), 0.0), (day(2), 0.0), (day(2), 10.0), (day(3), 10.0)];

        let flagged_points = |series: &[(NaiveDate, f64)]| -> Vec<(NaiveDate, f64, Extremum)> {
            let mut points: Vec<_> = detect_extrema(series, Sensitivity::absolute(0.0))
                .into_iter()
                .map(|p| (series[p.index].0, series[p.index].1, p.kind))
                .collect();
            points.sort_by(|x, y| series_order(&(x.0, x.1), &(y.0, y.1)));
            points
        };
        assert_eq!(flagged_points(&a), flagged_points(&b));
    }
}
