//! Config Validation Tests
//!
//! Typo detection, hard validation rules and the catalogue-to-table
//! conversion, exercised through the public config API only.

use std::io::Write;

use ckpi_analyzer::config::validation::{
    known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys,
};
use ckpi_analyzer::config::ConfigError;
use ckpi_analyzer::ingest::DateOrder;
use ckpi_analyzer::KpiConfig;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_detection_section_warns_with_suggestion() {
    let toml_str = r"
[detection]
sensitivty = 1.0
";
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("sensitivty"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("detection.sensitivity"),
        "Should suggest the correct spelling"
    );
}

#[test]
fn typo_in_kpi_field_suggests_kpi_field() {
    let toml_str = r#"
[kpis.doorFriction]
lwo = 30.0
high = 50.0
label = "Door Friction"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "kpis.doorFriction.lwo");
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("kpis.doorFriction.low")
    );
}

#[test]
fn kpi_names_are_free_form() {
    let toml_str = r"
[kpis.anyNameAtAll]
low = 1.0

[kpis.another_one]
high = 2.0
";
    assert!(validate_unknown_keys(toml_str).is_empty());
}

#[test]
fn unrelated_key_has_no_suggestion() {
    let warnings = validate_unknown_keys("completely_unrelated_setting = 1\n");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].suggestion.is_none());
}

#[test]
fn known_keys_cover_every_section() {
    let known = known_config_keys();
    for key in [
        "dates.ambiguous_order",
        "detection.sensitivity",
        "health.decay_rate",
        "insights.action_ratio",
        "forecast.horizon_days",
        "kpis",
    ] {
        assert!(known.contains(key), "missing {key}");
    }
    assert_eq!(
        suggest_correction("helth.decay_rate", known.iter().copied()).as_deref(),
        Some("health.decay_rate")
    );
}

// ============================================================================
// Hard Validation
// ============================================================================

fn validation_errors(toml_str: &str) -> Vec<String> {
    match KpiConfig::parse(toml_str) {
        Err(ConfigError::Validation(errors)) => errors,
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn inverted_band_rejected() {
    let errors = validation_errors(
        r"
[kpis.doorFriction]
low = 50.0
high = 30.0
",
    );
    assert!(errors.iter().any(|e| e.contains("kpis.doorFriction")));
}

#[test]
fn kpi_without_bounds_rejected() {
    let errors = validation_errors(
        r#"
[kpis.doorFriction]
label = "Door Friction"
"#,
    );
    assert!(errors.iter().any(|e| e.contains("at least one of low / high")));
}

#[test]
fn negative_weight_and_bad_health_rejected() {
    let errors = validation_errors(
        r"
[health]
edge_score = 1.5
monitoring_min = 90.0
excellent_min = 80.0

[kpis.doorFriction]
low = 30.0
weight = -1.0
",
    );
    assert!(errors.iter().any(|e| e.contains("weight")));
    assert!(errors.iter().any(|e| e.contains("edge_score")));
    assert!(errors.iter().any(|e| e.contains("monitoring_min")));
}

#[test]
fn colliding_aliases_rejected() {
    let errors = validation_errors(
        r#"
[kpis.doorFriction]
low = 30.0
aliases = ["DF"]

[kpis.doorForce]
high = 10.0
aliases = ["df"]
"#,
    );
    assert!(errors.iter().any(|e| e.contains("'df'")));
}

#[test]
fn nan_rejected() {
    let errors = validation_errors(
        r"
[detection]
sensitivity = nan
",
    );
    assert!(errors.iter().any(|e| e.contains("finite")));
}

// ============================================================================
// Loading and Conversion
// ============================================================================

#[test]
fn empty_file_gives_defaults() {
    let config = KpiConfig::parse("").unwrap();
    assert_eq!(config, KpiConfig::default());
    assert_eq!(config.kpis.len(), 6);
    assert_eq!(config.dates.ambiguous_order, DateOrder::DayFirst);
}

#[test]
fn kpis_section_replaces_catalogue() {
    let config = KpiConfig::parse(
        r#"
[dates]
ambiguous_order = "month_first"

[kpis.motorTemperature]
label = "Motor Temperature"
high = 80.0
weight = 2.0
remedy = "Check motor ventilation"
"#,
    )
    .unwrap();

    assert_eq!(config.dates.ambiguous_order, DateOrder::MonthFirst);
    assert_eq!(config.kpis.len(), 1);

    let thresholds = config.threshold_table();
    assert!(thresholds.contains("Motor Temperature"));
    assert!(thresholds.contains("motor_temperature"));
    assert!(!thresholds.contains("doorFriction"));
    assert_eq!(config.weight_table().get("motortemperature"), Some(2.0));
    assert_eq!(config.remedy_for("motortemperature"), "Check motor ventilation");
    assert_eq!(config.label_for("motortemperature"), "Motor Temperature");
}

#[test]
fn default_config_round_trips_through_toml() {
    let text = KpiConfig::default().to_toml().unwrap();
    assert_eq!(KpiConfig::parse(&text).unwrap(), KpiConfig::default());
    assert!(validate_unknown_keys(&text).is_empty());
}

#[test]
fn load_from_file_reports_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[detection]\nsensitivity = \"high\"").unwrap();
    file.flush().unwrap();

    let err = KpiConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(ref p, _) if p == file.path()));

    let missing = KpiConfig::load_from_file(std::path::Path::new("/nonexistent/kpi.toml"));
    assert!(matches!(missing, Err(ConfigError::Io(..))));
}

#[test]
fn suspicious_values_only_warn() {
    let config = KpiConfig::parse(
        r"
[detection]
sensitivity = 8.0

[kpis.doorFriction]
low = 30.0
high = 30.0
weight = 0.0
",
    )
    .unwrap();
    let warnings = validate_ranges(&config);
    assert!(warnings.iter().any(|w| w.field == "detection.sensitivity"));
    assert!(warnings.iter().any(|w| w.field == "kpis.doorFriction.weight"));
    assert!(warnings.iter().any(|w| w.field == "kpis.doorFriction"));
    assert!(warnings.iter().any(|w| w.field == "kpis"));
}

#[test]
fn parse_with_warnings_reports_each_warning_once() {
    let (config, warnings) = KpiConfig::parse_with_warnings(
        r"
[detection]
sensitivty = 1.0
sensitivity = 8.0
",
    )
    .unwrap();
    assert!((config.detection.sensitivity - 8.0).abs() < f64::EPSILON);

    let typo = warnings
        .iter()
        .filter(|w| w.field.contains("sensitivty"))
        .count();
    let range = warnings
        .iter()
        .filter(|w| w.field == "detection.sensitivity")
        .count();
    assert_eq!(typo, 1);
    assert_eq!(range, 1);
}
