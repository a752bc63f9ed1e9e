//! Pipeline Integration Tests
//!
//! Drive the public API end to end: raw table (or file) in, classified
//! series, health scores, forecasts and action items out.

use chrono::NaiveDate;
use std::io::Write;

use ckpi_analyzer::ingest::{self, DateOrder, RowError};
use ckpi_analyzer::pipeline::{summarize, DateRange, RangePreset, ReadingFilter};
use ckpi_analyzer::{
    classify, detect_extrema, score, Cell, Extremum, HealthStatus, KpiConfig, KpiPipeline,
    LimitStatus, RawTable, ScoringError, Sensitivity, StatusFlag,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
    RawTable::new(
        headers.iter().map(|h| (*h).to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|c| Cell::from(*c)).collect())
            .collect(),
    )
}

const HEADERS: [&str; 5] = ["Equipment ID", "Floor", "KPI", "Date", "AVE"];

// ============================================================================
// Peak/low end to end
// ============================================================================

#[test]
fn three_point_series_flags_middle_peak() {
    let series = [
        (date(2024, 1, 1), 10.0),
        (date(2024, 1, 2), 50.0),
        (date(2024, 1, 3), 12.0),
    ];
    let flagged = detect_extrema(&series, Sensitivity::absolute(1.0));
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].index, 1);
    assert_eq!(flagged[0].kind, Extremum::Peak);

    let t = table(
        &HEADERS,
        &[
            &["L1", "1", "doorFriction", "2024-01-01", "10"],
            &["L1", "1", "doorFriction", "2024-01-02", "50"],
            &["L1", "1", "doorFriction", "2024-01-03", "12"],
        ],
    );
    let outcome = classify(&t, &KpiConfig::default()).unwrap();
    let readings = &outcome.groups[0].readings;
    assert!(!readings[0].is_peak() && !readings[0].is_low());
    assert!(readings[1].is_peak());
    assert!(!readings[2].is_peak() && !readings[2].is_low());
}

#[test]
fn limit_and_extremum_flags_coexist() {
    let t = table(
        &HEADERS,
        &[
            &["L1", "1", "doorFriction", "2024-01-01", "31"],
            &["L1", "1", "doorFriction", "2024-01-02", "49"],
            &["L1", "1", "doorFriction", "2024-01-03", "32"],
        ],
    );
    let outcome = classify(&t, &KpiConfig::default()).unwrap();
    let peak = &outcome.groups[0].readings[1];
    assert_eq!(peak.status.limit, LimitStatus::WithinLimits);
    assert_eq!(
        peak.status.flags(),
        vec![StatusFlag::WithinLimits, StatusFlag::Peak]
    );
}

// ============================================================================
// Row-level failures
// ============================================================================

#[test]
fn malformed_date_drops_row_and_batch_continues() {
    let t = table(
        &HEADERS,
        &[
            &["L1", "1", "doorFriction", "01/01/2024", "40"],
            &["L1", "1", "doorFriction", "31/31/2024", "41"],
            &["L1", "1", "doorFriction", "03/01/2024", "42"],
            &["L1", "1", "doorFriction", "04/01/2024", "n/a"],
        ],
    );
    let outcome = classify(&t, &KpiConfig::default()).unwrap();

    assert_eq!(outcome.reading_count(), 2);
    assert_eq!(outcome.diagnostics.total_rows, 4);
    assert_eq!(outcome.diagnostics.accepted_rows, 2);
    assert_eq!(outcome.diagnostics.skipped.len(), 2);
    assert_eq!(outcome.diagnostics.skipped[0].row, 1);
    assert!(matches!(
        outcome.diagnostics.skipped[0].error,
        RowError::DateUnparseable { .. }
    ));
    assert!(matches!(
        outcome.diagnostics.skipped[1].error,
        RowError::ValueUnparseable { .. }
    ));
    assert_eq!(
        outcome.diagnostics.summary(),
        "2 rows skipped, reasons: DateUnparseable (1), ValueUnparseable (1)"
    );
}

#[test]
fn schema_failure_aborts_file() {
    let t = table(&["KPI", "Comment"], &[&["doorFriction", "ok"]]);
    assert!(classify(&t, &KpiConfig::default()).is_err());
}

#[test]
fn month_first_config_changes_ambiguous_dates() {
    let t = table(
        &HEADERS,
        &[&["L1", "1", "doorFriction", "03/04/2024", "40"]],
    );

    let day_first = classify(&t, &KpiConfig::default()).unwrap();
    assert_eq!(day_first.latest_date(), Some(date(2024, 4, 3)));

    let mut config = KpiConfig::default();
    config.dates.ambiguous_order = DateOrder::MonthFirst;
    let month_first = classify(&t, &config).unwrap();
    assert_eq!(month_first.latest_date(), Some(date(2024, 3, 4)));
}

// ============================================================================
// Health scoring
// ============================================================================

#[test]
fn centered_kpis_score_100_and_equal_offsets_score_equal() {
    let t = table(
        &HEADERS,
        &[
            &["L1", "1", "doorFriction", "2024-01-01", "40"],
            &["L1", "1", "lockHookClosingTime", "2024-01-01", "0.4"],
            &["L2", "1", "doorFriction", "2024-01-01", "60"],
            &["L3", "1", "doorFriction", "2024-01-01", "60"],
        ],
    );
    let config = KpiConfig::default();
    let outcome = classify(&t, &config).unwrap();
    let readings: Vec<_> = outcome.readings().cloned().collect();

    let l1 = score("L1", &readings, &config).unwrap();
    assert!((l1.score - 100.0).abs() < 1e-9);
    assert_eq!(l1.status, HealthStatus::Excellent);
    assert_eq!(l1.contributing_kpis.len(), 2);

    let l2 = score("L2", &readings, &config).unwrap();
    let l3 = score("L3", &readings, &config).unwrap();
    assert!((l2.score - l3.score).abs() < f64::EPSILON);
    assert!(l2.score < 90.0);
}

#[test]
fn unscorable_equipment_does_not_affect_others() {
    let t = table(
        &HEADERS,
        &[
            &["L1", "1", "doorFriction", "2024-01-01", "40"],
            &["L2", "1", "motorTemperature", "2024-01-01", "70"],
        ],
    );
    let pipeline = KpiPipeline::new(KpiConfig::default());
    let outcome = pipeline.classify(&t).unwrap();
    let readings: Vec<_> = outcome.readings().cloned().collect();

    let fleet = pipeline.score_fleet(&readings);
    assert_eq!(fleet.len(), 2);
    assert_eq!(fleet[0].0, "L1");
    assert!(fleet[0].1.is_ok());
    assert_eq!(
        fleet[1].1,
        Err(ScoringError::InsufficientData {
            equipment_id: "L2".to_string()
        })
    );
}

// ============================================================================
// Insights, filters and forecasts
// ============================================================================

#[test]
fn noisy_series_produces_action_item() {
    let t = table(
        &HEADERS,
        &[
            &["L1", "2", "doorFriction", "2024-01-01", "35"],
            &["L1", "2", "doorFriction", "2024-01-02", "48"],
            &["L1", "2", "doorFriction", "2024-01-03", "33"],
            &["L1", "2", "doorFriction", "2024-01-04", "47"],
            &["L1", "2", "doorFriction", "2024-01-05", "34"],
        ],
    );
    let config = KpiConfig::default();
    let outcome = classify(&t, &config).unwrap();
    let summaries = summarize(&outcome.groups, &config);

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].peaks, 2);
    assert_eq!(summaries[0].lows, 1);
    let action = summaries[0].action.as_ref().unwrap();
    assert_eq!(action.key.floor.as_deref(), Some("2"));
    assert_eq!(action.remedy, config.remedy_for("doorfriction"));
}

#[test]
fn range_preset_filters_old_readings() {
    let t = table(
        &HEADERS,
        &[
            &["L1", "1", "doorFriction", "2023-06-01", "40"],
            &["L1", "1", "doorFriction", "2024-03-10", "41"],
            &["L1", "1", "doorFriction", "2024-03-31", "42"],
        ],
    );
    let pipeline = KpiPipeline::new(KpiConfig::default());
    let outcome = pipeline.classify(&t).unwrap();
    let latest = outcome.latest_date().unwrap();

    let filter = ReadingFilter {
        range: Some(DateRange::preset(latest, RangePreset::Month)),
        ..ReadingFilter::default()
    };
    let window = pipeline.classify_window(&outcome, &filter);
    assert_eq!(window.reading_count(), 2);
}

#[test]
fn rising_trend_is_forecast_to_breach() {
    let rows: Vec<Vec<String>> = (0..12)
        .map(|i| {
            vec![
                "L1".to_string(),
                "1".to_string(),
                "doorFriction".to_string(),
                format!("2024-01-{:02}", i + 1),
                format!("{}", 40.0 + 0.6 * f64::from(i)),
            ]
        })
        .collect();
    let row_refs: Vec<Vec<&str>> = rows
        .iter()
        .map(|r| r.iter().map(String::as_str).collect())
        .collect();
    let row_slices: Vec<&[&str]> = row_refs.iter().map(Vec::as_slice).collect();
    let t = table(&HEADERS, &row_slices);

    let pipeline = KpiPipeline::new(KpiConfig::default());
    let outcome = pipeline.classify(&t).unwrap();
    let forecasts = pipeline.forecasts(&outcome.groups);
    assert_eq!(forecasts.len(), 1);
    assert_eq!(forecasts[0].forecast.breach_date, date(2024, 1, 18));
    assert_eq!(forecasts[0].forecast.days_remaining, 6);
}

// ============================================================================
// File adapters
// ============================================================================

#[test]
fn csv_file_runs_through_pipeline() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "eq,floor,ckpi,ckpi_statistics_date,ave,comment").unwrap();
    writeln!(file, "L7,5,lockHookTime,02/01/2024,0.35,").unwrap();
    writeln!(file, "L7,5,lockHookTime,03/01/2024,0.10,late").unwrap();
    file.flush().unwrap();

    let t = ingest::read_path(file.path()).unwrap();
    let outcome = classify(&t, &KpiConfig::default()).unwrap();
    assert_eq!(outcome.mapping.value.header, "ave");
    assert_eq!(outcome.reading_count(), 2);
    let second = &outcome.groups[0].readings[1];
    assert_eq!(second.reading.date, date(2024, 1, 3));
    assert!(second.is_outside_limits());
}

#[test]
fn json_records_run_through_pipeline() {
    let json = r#"{
        "meta": {"site": "Tower A"},
        "rows": [
            {"EQ": "L1", "CKPI": "Door Friction", "Date": "2024-02-01", "AVE": 55.5},
            {"EQ": "L1", "CKPI": "Door Friction", "Date": "2024-02-02", "AVE": 41.0}
        ]
    }"#;
    let t = ingest::table::read_json_str(json).unwrap();
    let outcome = classify(&t, &KpiConfig::default()).unwrap();
    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.groups[0].key.kpi, "doorfriction");
    assert!(outcome.groups[0].readings[0].is_outside_limits());
}
