//! System-wide default constants.
//!
//! Centralises the tuning values used when no `kpi_config.toml` is present.
//! Grouped by subsystem for easy discovery.

use super::KpiDefinition;
use std::collections::BTreeMap;

// ============================================================================
// Schema Detection
// ============================================================================

/// Rows inspected by the content heuristics of the schema detector.
pub const SCHEMA_SAMPLE_ROWS: usize = 50;

/// Fraction of non-blank sample cells that must parse for a column to count
/// as "mostly" dates / numbers.
pub const CONTENT_MAJORITY: f64 = 0.5;

// ============================================================================
// Peak / Low Detection
// ============================================================================

/// Margin as a fraction of the series population standard deviation.
pub const DEFAULT_SENSITIVITY: f64 = 0.5;

/// Absolute floor on the extremum margin.
pub const DEFAULT_MIN_MARGIN: f64 = 0.0;

// ============================================================================
// Health Scoring
// ============================================================================

/// Normalized value at the edge of a two-sided band (1.0 at the centre).
pub const DEFAULT_EDGE_SCORE: f64 = 0.9;

/// Exponential decay per band-width of excess outside the limits.
pub const DEFAULT_DECAY_RATE: f64 = 2.0;

/// Score at or above which equipment is Excellent.
pub const DEFAULT_EXCELLENT_MIN: f64 = 85.0;

/// Score at or above which equipment Needs Monitoring (below is Critical).
pub const DEFAULT_MONITORING_MIN: f64 = 70.0;

/// Weight given to a KPI when its definition omits one.
pub const DEFAULT_KPI_WEIGHT: f64 = 0.5;

// ============================================================================
// Insights
// ============================================================================

/// Extremum share of a series above which a technician check is raised.
pub const DEFAULT_ACTION_RATIO: f64 = 0.2;

pub const DEFAULT_REMEDY: &str = "Follow standard inspection checklist";

pub const ACTION_TECHNICIAN_CHECK: &str = "High uncertainty - technician check";

// ============================================================================
// Forecast
// ============================================================================

/// Minimum readings in a series before a trend is fitted.
pub const DEFAULT_FORECAST_MIN_POINTS: usize = 10;

/// Days projected past the last reading.
pub const DEFAULT_FORECAST_HORIZON_DAYS: u32 = 365;

/// Maximum p-value of the trend correlation for it to be used.
pub const DEFAULT_FORECAST_SIGNIFICANCE: f64 = 0.05;

// ============================================================================
// KPI Catalogue
// ============================================================================

/// The six door-system KPIs tracked by the maintenance dashboard.
pub fn default_kpis() -> BTreeMap<String, KpiDefinition> {
    let mut kpis = BTreeMap::new();
    kpis.insert(
        "doorFriction".to_string(),
        KpiDefinition {
            label: "Door Friction".to_string(),
            low: Some(30.0),
            high: Some(50.0),
            weight: DEFAULT_KPI_WEIGHT,
            aliases: Vec::new(),
            remedy: Some("Lubricate guide rails; inspect rollers".to_string()),
        },
    );
    kpis.insert(
        "cumulativeDoorSpeedError".to_string(),
        KpiDefinition {
            label: "Door Speed Error".to_string(),
            low: Some(0.05),
            high: Some(0.08),
            weight: DEFAULT_KPI_WEIGHT,
            aliases: Vec::new(),
            remedy: Some("Check door motor encoder calibration".to_string()),
        },
    );
    kpis.insert(
        "lockHookClosingTime".to_string(),
        KpiDefinition {
            label: "Landing Door Lock Hook Closing Time".to_string(),
            low: Some(0.2),
            high: Some(0.6),
            weight: DEFAULT_KPI_WEIGHT,
            aliases: Vec::new(),
            remedy: Some("Inspect lock hook mechanism and wiring".to_string()),
        },
    );
    kpis.insert(
        "lockHookTime".to_string(),
        KpiDefinition {
            label: "Landing Door Lock Hook Open Time".to_string(),
            low: Some(0.3),
            high: None,
            weight: DEFAULT_KPI_WEIGHT,
            aliases: Vec::new(),
            remedy: Some("Verify actuator response timing".to_string()),
        },
    );
    kpis.insert(
        "maximumForceDuringCompress".to_string(),
        KpiDefinition {
            label: "Maximum Force During Coupler Compress".to_string(),
            low: Some(5.0),
            high: Some(28.0),
            weight: DEFAULT_KPI_WEIGHT,
            aliases: Vec::new(),
            remedy: Some("Check coupler alignment settings".to_string()),
        },
    );
    kpis.insert(
        "landingDoorLockRollerClearance".to_string(),
        KpiDefinition {
            label: "Landing Door Lock Roller Clearance".to_string(),
            low: None,
            high: Some(0.029),
            weight: DEFAULT_KPI_WEIGHT,
            aliases: Vec::new(),
            remedy: Some("Measure roller clearance; replace worn rollers".to_string()),
        },
    );
    kpis
}
