//! KPI Pipeline - ingestion to classification to scoring
//!
//! ```text
//! STAGE 1: Schema detection       (abort the file on SchemaError)
//! STAGE 2: Record building        (per-row drop + diagnostics)
//! STAGE 3: Series grouping        (equipment, canonical KPI, floor; date then value order)
//! STAGE 4: Threshold classification
//! STAGE 5: Peak/low flags         (per series)
//! STAGE 6: Health scoring         (per equipment, parallel)
//! STAGE 7: Breach forecasts + action items
//! ```
//!
//! [`KpiPipeline`] owns the loaded [`KpiConfig`] and the immutable tables
//! built from it, so one instance can serve any number of files. The free
//! functions [`classify`], [`score`] and [`score_fleet`] are one-shot
//! conveniences over it.

pub mod filter;
pub mod insights;

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::KpiConfig;
use crate::ingest::{build_readings, detect_schema, Diagnostics, SchemaError, SchemaMapping};
use crate::processing::{
    classify_reading, forecast_breach, series_order, BreachForecast, ScoringError,
};
use crate::types::{
    ClassifiedReading, EquipmentHealthScore, RawTable, Reading, SeriesKey, ThresholdTable,
    WeightTable,
};

pub use crate::processing::{detect_extrema, FlaggedPoint, Sensitivity};
pub use filter::{DateRange, RangePreset, ReadingFilter};
pub use insights::{action_items, summarize, ActionItem, GroupSummary};

// ============================================================================
// Outcome Types
// ============================================================================

/// Date-ordered readings of one (equipment, KPI, floor) series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesGroup {
    pub key: SeriesKey,
    pub readings: Vec<ClassifiedReading>,
}

impl SeriesGroup {
    /// `(date, value)` pairs in series order.
    pub fn points(&self) -> Vec<(NaiveDate, f64)> {
        self.readings
            .iter()
            .map(|r| (r.reading.date, r.reading.value))
            .collect()
    }

    pub fn peak_count(&self) -> usize {
        self.readings.iter().filter(|r| r.is_peak()).count()
    }

    pub fn low_count(&self) -> usize {
        self.readings.iter().filter(|r| r.is_low()).count()
    }
}

/// Result of one classification pass over a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationOutcome {
    pub mapping: SchemaMapping,
    /// Ordered by series key, readings date ordered within each group
    pub groups: Vec<SeriesGroup>,
    pub diagnostics: Diagnostics,
}

impl ClassificationOutcome {
    /// All classified readings, group by group.
    pub fn readings(&self) -> impl Iterator<Item = &ClassifiedReading> + '_ {
        self.groups.iter().flat_map(|g| g.readings.iter())
    }

    pub fn reading_count(&self) -> usize {
        self.groups.iter().map(|g| g.readings.len()).sum()
    }

    /// Latest reading date across the whole table.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.readings().map(|r| r.reading.date).max()
    }

    /// Distinct equipment ids in key order.
    pub fn equipment_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.groups.iter().map(|g| g.key.equipment_id.as_str()).collect();
        ids.dedup();
        ids
    }

    /// Copy of the outcome keeping only readings accepted by `filter`.
    /// Groups left empty are dropped; extremum flags are kept as computed
    /// over the full series.
    #[must_use]
    pub fn filtered(&self, filter: &ReadingFilter) -> Self {
        let groups = self
            .groups
            .iter()
            .filter(|g| filter.accepts_key(&g.key))
            .filter_map(|g| {
                let readings: Vec<ClassifiedReading> = g
                    .readings
                    .iter()
                    .filter(|r| filter.accepts_date(r.reading.date))
                    .cloned()
                    .collect();
                (!readings.is_empty()).then(|| SeriesGroup {
                    key: g.key.clone(),
                    readings,
                })
            })
            .collect();
        Self {
            mapping: self.mapping.clone(),
            groups,
            diagnostics: self.diagnostics.clone(),
        }
    }
}

/// A projected threshold breach for one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesForecast {
    pub key: SeriesKey,
    pub forecast: BreachForecast,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Loaded configuration plus the immutable lookup tables derived from it.
#[derive(Debug, Clone)]
pub struct KpiPipeline {
    config: KpiConfig,
    thresholds: ThresholdTable,
    weights: WeightTable,
}

impl KpiPipeline {
    pub fn new(config: KpiConfig) -> Self {
        let thresholds = config.threshold_table();
        let weights = config.weight_table();
        Self {
            config,
            thresholds,
            weights,
        }
    }

    pub fn config(&self) -> &KpiConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Stages 1-5 over one input table.
    pub fn classify(&self, table: &RawTable) -> Result<ClassificationOutcome, SchemaError> {
        let mapping = detect_schema(table)?;
        let (readings, diagnostics) =
            build_readings(table, &mapping, self.config.dates.ambiguous_order);
        let groups = self.classify_readings(readings);

        info!(
            rows = diagnostics.total_rows,
            accepted = diagnostics.accepted_rows,
            skipped = diagnostics.skipped_count(),
            series = groups.len(),
            "Table classified"
        );

        Ok(ClassificationOutcome {
            mapping,
            groups,
            diagnostics,
        })
    }

    /// Stages 3-5 over already-built readings.
    pub fn classify_readings(&self, readings: Vec<Reading>) -> Vec<SeriesGroup> {
        let mut by_series: BTreeMap<SeriesKey, Vec<Reading>> = BTreeMap::new();
        for reading in readings {
            let key = SeriesKey {
                equipment_id: reading.equipment_id.clone(),
                kpi: self.thresholds.canonical_key(&reading.kpi),
                floor: reading.floor.clone(),
            };
            by_series.entry(key).or_default().push(reading);
        }

        let sensitivity = self.config.detection.sensitivity();
        by_series
            .into_iter()
            .map(|(key, mut series)| {
                series.sort_by(|x, y| series_order(&(x.date, x.value), &(y.date, y.value)));
                let points: Vec<(NaiveDate, f64)> =
                    series.iter().map(|r| (r.date, r.value)).collect();
                let flagged = detect_extrema(&points, sensitivity);

                let mut readings: Vec<ClassifiedReading> = series
                    .into_iter()
                    .map(|r| classify_reading(r, &self.thresholds))
                    .collect();
                for point in &flagged {
                    readings[point.index].status.extremum = Some(point.kind);
                }

                debug!(
                    series = %key,
                    points = readings.len(),
                    extrema = flagged.len(),
                    "Series classified"
                );
                SeriesGroup { key, readings }
            })
            .collect()
    }

    /// Restrict `outcome` to `filter` and recompute peak/low flags over the
    /// selected window only, so a range preset sees its own local extrema.
    pub fn classify_window(
        &self,
        outcome: &ClassificationOutcome,
        filter: &ReadingFilter,
    ) -> ClassificationOutcome {
        let selected = outcome.filtered(filter);
        let readings: Vec<Reading> = selected.readings().map(|r| r.reading.clone()).collect();
        ClassificationOutcome {
            groups: self.classify_readings(readings),
            ..selected
        }
    }

    /// Health score of one equipment.
    pub fn score(
        &self,
        equipment_id: &str,
        readings: &[ClassifiedReading],
    ) -> Result<EquipmentHealthScore, ScoringError> {
        crate::processing::score_equipment(
            equipment_id,
            readings,
            &self.thresholds,
            &self.weights,
            &self.config.health,
        )
    }

    /// Health score of every equipment in `readings`, ordered by id.
    pub fn score_fleet(
        &self,
        readings: &[ClassifiedReading],
    ) -> Vec<(String, Result<EquipmentHealthScore, ScoringError>)> {
        crate::processing::score_fleet(readings, &self.thresholds, &self.weights, &self.config.health)
    }

    /// Projected breaches for every series with a threshold band.
    pub fn forecasts(&self, groups: &[SeriesGroup]) -> Vec<SeriesForecast> {
        groups
            .iter()
            .filter_map(|g| {
                let band = self.thresholds.get(&g.key.kpi)?;
                let forecast = forecast_breach(&g.points(), band, &self.config.forecast)?;
                info!(
                    series = %g.key,
                    breach_date = %forecast.breach_date,
                    days_remaining = forecast.days_remaining,
                    "Threshold breach projected"
                );
                Some(SeriesForecast {
                    key: g.key.clone(),
                    forecast,
                })
            })
            .collect()
    }

    /// Per-series summaries with action items.
    pub fn summarize(&self, groups: &[SeriesGroup]) -> Vec<GroupSummary> {
        summarize(groups, &self.config)
    }
}

// ============================================================================
// One-shot API
// ============================================================================

/// Classify a table with `config`.
pub fn classify(table: &RawTable, config: &KpiConfig) -> Result<ClassificationOutcome, SchemaError> {
    KpiPipeline::new(config.clone()).classify(table)
}

/// Score one equipment with `config`.
pub fn score(
    equipment_id: &str,
    readings: &[ClassifiedReading],
    config: &KpiConfig,
) -> Result<EquipmentHealthScore, ScoringError> {
    KpiPipeline::new(config.clone()).score(equipment_id, readings)
}

/// Score every equipment with `config`.
pub fn score_fleet(
    readings: &[ClassifiedReading],
    config: &KpiConfig,
) -> Vec<(String, Result<EquipmentHealthScore, ScoringError>)> {
    KpiPipeline::new(config.clone()).score_fleet(readings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cell, Extremum, LimitStatus};

    fn table(rows: &[[&str; 5]]) -> RawTable {
        RawTable::new(
            ["eq", "floor", "ckpi", "ckpi_statistics_date", "ave"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| Cell::from(*c)).collect())
                .collect(),
        )
    }

    #[test]
    fn test_groups_sorted_by_date_and_flagged() {
        let t = table(&[
            ["L1", "1", "doorFriction", "03/01/2024", "40"],
            ["L1", "1", "doorFriction", "01/01/2024", "35"],
            ["L1", "1", "doorFriction", "02/01/2024", "49"],
        ]);
        let outcome = classify(&t, &KpiConfig::default()).unwrap();
        assert_eq!(outcome.groups.len(), 1);

        let group = &outcome.groups[0];
        assert_eq!(group.key.kpi, "doorfriction");
        let values: Vec<f64> = group.readings.iter().map(|r| r.reading.value).collect();
        assert_eq!(values, vec![35.0, 49.0, 40.0]);
        assert_eq!(group.readings[1].status.extremum, Some(Extremum::Peak));
        assert_eq!(group.readings[1].status.limit, LimitStatus::WithinLimits);
        assert_eq!(group.peak_count(), 1);
        assert_eq!(group.low_count(), 0);
    }

    #[test]
    fn test_duplicate_dates_classify_the_same_in_any_row_order() {
        let rows_a = [
            ["L1", "1", "doorFriction", "01/01/2024", "30"],
            ["L1", "1", "doorFriction", "02/01/2024", "45"],
            ["L1", "1", "doorFriction", "02/01/2024", "30"],
            ["L1", "1", "doorFriction", "03/01/2024", "45"],
        ];
        let mut rows_b = rows_a;
        rows_b.swap(1, 2);

        let flags = |rows: &[[&str; 5]]| -> Vec<(NaiveDate, f64, Option<Extremum>)> {
            classify(&table(rows), &KpiConfig::default())
                .unwrap()
                .readings()
                .map(|r| (r.reading.date, r.reading.value, r.status.extremum))
                .collect()
        };
        assert_eq!(flags(&rows_a), flags(&rows_b));
    }

    #[test]
    fn test_floors_are_separate_series() {
        let t = table(&[
            ["L1", "1", "doorFriction", "01/01/2024", "35"],
            ["L1", "2", "doorFriction", "01/01/2024", "36"],
            ["L2", "1", "lockHookTime", "01/01/2024", "0.2"],
        ]);
        let outcome = classify(&t, &KpiConfig::default()).unwrap();
        assert_eq!(outcome.groups.len(), 3);
        assert_eq!(outcome.equipment_ids(), vec!["L1", "L2"]);
        assert_eq!(outcome.reading_count(), 3);
    }

    #[test]
    fn test_kpi_spellings_share_a_series() {
        let t = table(&[
            ["L1", "1", "doorFriction", "01/01/2024", "35"],
            ["L1", "1", "DOOR_FRICTION", "02/01/2024", "60"],
            ["L1", "1", "door friction", "03/01/2024", "36"],
        ]);
        let outcome = classify(&t, &KpiConfig::default()).unwrap();
        assert_eq!(outcome.groups.len(), 1);
        assert!(outcome.groups[0].readings[1].is_peak());
        assert!(outcome.groups[0].readings[1].is_outside_limits());
    }

    #[test]
    fn test_score_fleet_through_pipeline() {
        let t = table(&[
            ["L1", "1", "doorFriction", "01/01/2024", "40"],
            ["L2", "1", "unknownKpi", "01/01/2024", "1"],
        ]);
        let pipeline = KpiPipeline::new(KpiConfig::default());
        let outcome = pipeline.classify(&t).unwrap();
        let readings: Vec<ClassifiedReading> = outcome.readings().cloned().collect();
        let scores = pipeline.score_fleet(&readings);

        assert_eq!(scores.len(), 2);
        let l1 = scores[0].1.as_ref().unwrap();
        assert!((l1.score - 100.0).abs() < 1e-9);
        assert!(matches!(
            scores[1].1,
            Err(ScoringError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_filtered_drops_empty_groups() {
        let t = table(&[
            ["L1", "1", "doorFriction", "01/01/2024", "35"],
            ["L1", "1", "doorFriction", "20/01/2024", "36"],
            ["L2", "1", "doorFriction", "01/01/2024", "37"],
        ]);
        let outcome = classify(&t, &KpiConfig::default()).unwrap();
        let filter = ReadingFilter {
            equipment: vec!["L1".into()],
            range: Some(DateRange::new(
                NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            )),
            ..ReadingFilter::default()
        };
        let filtered = outcome.filtered(&filter);
        assert_eq!(filtered.groups.len(), 1);
        assert_eq!(filtered.reading_count(), 1);
        assert_eq!(filtered.latest_date(), NaiveDate::from_ymd_opt(2024, 1, 20));
    }

    #[test]
    fn test_window_recomputes_extrema() {
        let t = table(&[
            ["L1", "1", "doorFriction", "01/01/2024", "35"],
            ["L1", "1", "doorFriction", "02/01/2024", "48"],
            ["L1", "1", "doorFriction", "03/01/2024", "36"],
            ["L1", "1", "doorFriction", "04/01/2024", "37"],
        ]);
        let pipeline = KpiPipeline::new(KpiConfig::default());
        let outcome = pipeline.classify(&t).unwrap();
        assert!(outcome.groups[0].readings[1].is_peak());

        // window starts at the peak, which becomes an edge point
        let filter = ReadingFilter {
            range: Some(DateRange::new(
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
            )),
            ..ReadingFilter::default()
        };
        assert!(outcome.filtered(&filter).groups[0].readings[0].is_peak());
        let window = pipeline.classify_window(&outcome, &filter);
        assert_eq!(window.reading_count(), 3);
        assert_eq!(window.groups[0].peak_count(), 0);
    }
}
