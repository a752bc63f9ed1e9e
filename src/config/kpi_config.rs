//! KPI Configuration - thresholds, weights and tuning as operator-editable TOML
//!
//! Every tunable used by the pipeline is a field in this module. Each struct
//! implements `Default` with the values in `defaults.rs`, so the analyzer
//! behaves identically with no config file present.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use super::validation::ValidationWarning;
use crate::ingest::dates::DateOrder;
use crate::processing::extrema::Sensitivity;
use crate::types::{normalize_kpi_name, ThresholdBand, ThresholdTable, WeightTable};

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "CKPI_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "kpi_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for an analysis run.
///
/// Load with `KpiConfig::load()` which searches:
/// 1. `$CKPI_CONFIG` env var
/// 2. `./kpi_config.toml`
/// 3. Built-in defaults
///
/// The loaded value is never mutated; components receive it (or the tables
/// derived from it) by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiConfig {
    /// Date parsing policy
    #[serde(default)]
    pub dates: DateConfig,

    /// Peak / low detection tuning
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Health score normalization and status bands
    #[serde(default)]
    pub health: HealthConfig,

    /// Actionable insight rules
    #[serde(default)]
    pub insights: InsightsConfig,

    /// Threshold breach forecasting
    #[serde(default)]
    pub forecast: ForecastConfig,

    /// KPI catalogue keyed by canonical name. A `[kpis]` section in the file
    /// replaces the built-in catalogue entirely.
    #[serde(default = "defaults::default_kpis")]
    pub kpis: BTreeMap<String, KpiDefinition>,
}

impl Default for KpiConfig {
    fn default() -> Self {
        Self {
            dates: DateConfig::default(),
            detection: DetectionConfig::default(),
            health: HealthConfig::default(),
            insights: InsightsConfig::default(),
            forecast: ForecastConfig::default(),
            kpis: defaults::default_kpis(),
        }
    }
}

impl KpiConfig {
    /// Load configuration using the standard search order:
    /// 1. `$CKPI_CONFIG` environment variable
    /// 2. `./kpi_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), kpis = config.kpis.len(), "Loaded KPI config from CKPI_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from CKPI_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "CKPI_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(kpis = config.kpis.len(), "Loaded KPI config from ./kpi_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./kpi_config.toml, using defaults");
                }
            }
        }

        info!("No kpi_config.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::parse(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys only warn.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let (config, warnings) = Self::parse_with_warnings(contents)?;
        for w in &warnings {
            warn!("{}", w);
        }
        Ok(config)
    }

    /// Like [`KpiConfig::parse`] but hands back the unknown-key and range
    /// warnings instead of logging them. Each warning appears once.
    pub fn parse_with_warnings(
        contents: &str,
    ) -> Result<(Self, Vec<ValidationWarning>), ConfigError> {
        let mut warnings = super::validation::validate_unknown_keys(contents);
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.check()?;
        warnings.extend(super::validation::validate_ranges(&config));
        Ok((config, warnings))
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all values for internal consistency.
    ///
    /// Rules:
    /// - every KPI has at least one bound, low <= high, finite non-negative weight
    /// - no two KPIs share a normalized name, label or alias
    /// - health edge score in (0, 1], decay rate > 0, status bands ordered
    /// - sensitivity >= 0, action ratio in (0, 1], forecast settings sane
    ///
    /// Suspicious but legal values are logged as warnings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check()?;
        for w in super::validation::validate_ranges(self) {
            warn!("{}", w);
        }
        Ok(())
    }

    /// Hard rules only, nothing logged.
    fn check(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        for (name, kpi) in &self.kpis {
            Self::check_band(name, kpi, &mut errors);
            if !kpi.weight.is_finite() || kpi.weight < 0.0 {
                errors.push(format!(
                    "kpis.{name}.weight must be a finite number >= 0 (got {})",
                    kpi.weight
                ));
            }
        }
        self.check_name_collisions(&mut errors);

        let h = &self.health;
        if !(h.edge_score > 0.0 && h.edge_score <= 1.0) {
            errors.push(format!(
                "health.edge_score must be in (0, 1], got {}",
                h.edge_score
            ));
        }
        if h.decay_rate <= 0.0 {
            errors.push("health.decay_rate must be > 0".to_string());
        }
        if h.monitoring_min > h.excellent_min {
            errors.push(format!(
                "health.monitoring_min ({:.1}) must be <= excellent_min ({:.1})",
                h.monitoring_min, h.excellent_min
            ));
        }
        if h.monitoring_min < 0.0 || h.excellent_min > 100.0 {
            errors.push("health status bands must lie within 0-100".to_string());
        }

        let d = &self.detection;
        if d.sensitivity < 0.0 {
            errors.push("detection.sensitivity must be >= 0".to_string());
        }
        if d.min_margin < 0.0 {
            errors.push("detection.min_margin must be >= 0".to_string());
        }

        if !(self.insights.action_ratio > 0.0 && self.insights.action_ratio <= 1.0) {
            errors.push(format!(
                "insights.action_ratio must be in (0, 1], got {}",
                self.insights.action_ratio
            ));
        }

        let f = &self.forecast;
        if f.min_points < 3 {
            errors.push("forecast.min_points must be >= 3".to_string());
        }
        if f.horizon_days == 0 {
            errors.push("forecast.horizon_days must be > 0".to_string());
        }
        if !(f.significance > 0.0 && f.significance < 1.0) {
            errors.push("forecast.significance must be in (0, 1)".to_string());
        }

        // Reject NaN/Inf anywhere (sweep all float fields via serialization)
        if let Ok(value) = toml::Value::try_from(self) {
            for key in super::validation::non_finite_keys(&value, "") {
                errors.push(format!("{key} must be a finite number"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_band(name: &str, kpi: &KpiDefinition, errors: &mut Vec<String>) {
        match (kpi.low, kpi.high) {
            (None, None) => errors.push(format!(
                "kpis.{name}: at least one of low / high must be set"
            )),
            (Some(lo), Some(hi)) => {
                if !lo.is_finite() || !hi.is_finite() {
                    errors.push(format!(
                        "kpis.{name}: bounds must be finite (got low={lo}, high={hi})"
                    ));
                } else if lo > hi {
                    errors.push(format!(
                        "kpis.{name}: low ({lo:.3}) must be <= high ({hi:.3})"
                    ));
                }
            }
            (Some(bound), None) | (None, Some(bound)) => {
                if !bound.is_finite() {
                    errors.push(format!("kpis.{name}: bound must be finite (got {bound})"));
                }
            }
        }
    }

    fn check_name_collisions(&self, errors: &mut Vec<String>) {
        let mut owners: HashMap<String, &str> = HashMap::new();
        for (name, kpi) in &self.kpis {
            let mut keys: Vec<String> = vec![normalize_kpi_name(name)];
            keys.extend(kpi.match_names().map(normalize_kpi_name));
            keys.sort();
            keys.dedup();
            for key in keys {
                if key.is_empty() {
                    continue;
                }
                if let Some(other) = owners.insert(key.clone(), name) {
                    errors.push(format!(
                        "kpis.{name} and kpis.{other} both match the name '{key}'"
                    ));
                }
            }
        }
    }

    /// Immutable KPI → band table with labels and aliases resolved.
    pub fn threshold_table(&self) -> ThresholdTable {
        let bands = self.kpis.iter().filter_map(|(name, kpi)| {
            kpi.band().map(|band| (name.clone(), band))
        });
        let aliases = self.kpis.iter().flat_map(|(name, kpi)| {
            kpi.match_names()
                .map(move |alias| (alias.to_string(), name.clone()))
        });
        ThresholdTable::new(bands, aliases.collect::<Vec<_>>())
    }

    /// Immutable canonical KPI → weight table.
    pub fn weight_table(&self) -> WeightTable {
        WeightTable::new(
            self.kpis
                .iter()
                .map(|(name, kpi)| (name.clone(), kpi.weight)),
        )
    }

    /// Definition for a canonical (normalized) KPI key.
    pub fn definition(&self, canonical_kpi: &str) -> Option<&KpiDefinition> {
        self.kpis
            .iter()
            .find(|(name, _)| normalize_kpi_name(name) == canonical_kpi)
            .map(|(_, kpi)| kpi)
    }

    /// Remedy text for a canonical KPI key, falling back to the default.
    pub fn remedy_for(&self, canonical_kpi: &str) -> &str {
        self.definition(canonical_kpi)
            .and_then(|kpi| kpi.remedy.as_deref())
            .unwrap_or(&self.insights.default_remedy)
    }

    /// Display label for a canonical KPI key, falling back to the key itself.
    pub fn label_for<'a>(&'a self, canonical_kpi: &'a str) -> &'a str {
        self.definition(canonical_kpi)
            .map(|kpi| kpi.label.as_str())
            .filter(|label| !label.is_empty())
            .unwrap_or(canonical_kpi)
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// KPI Definition
// ============================================================================

/// One tracked KPI: its normal band, scoring weight and naming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiDefinition {
    /// Display name; also accepted as a match for incoming KPI names
    #[serde(default)]
    pub label: String,

    /// Lower bound of the normal band (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,

    /// Upper bound of the normal band (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,

    /// Health score weight; 0 excludes the KPI from scoring
    #[serde(default = "default_kpi_weight")]
    pub weight: f64,

    /// Additional names the KPI appears under in input files
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Maintenance remedy suggested when the KPI needs attention
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remedy: Option<String>,
}

fn default_kpi_weight() -> f64 {
    defaults::DEFAULT_KPI_WEIGHT
}

impl KpiDefinition {
    pub fn band(&self) -> Option<ThresholdBand> {
        if self.low.is_none() && self.high.is_none() {
            return None;
        }
        Some(ThresholdBand {
            low: self.low,
            high: self.high,
        })
    }

    /// Label and aliases, skipping blanks.
    fn match_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.label.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .filter(|s| !s.trim().is_empty())
    }
}

// ============================================================================
// Dates
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DateConfig {
    /// Order applied when both day-first and month-first readings are valid
    #[serde(default)]
    pub ambiguous_order: DateOrder,
}

// ============================================================================
// Detection
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Peak/low margin as a fraction of the series standard deviation
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,

    /// Absolute floor for the margin
    #[serde(default)]
    pub min_margin: f64,
}

fn default_sensitivity() -> f64 {
    defaults::DEFAULT_SENSITIVITY
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sensitivity: default_sensitivity(),
            min_margin: defaults::DEFAULT_MIN_MARGIN,
        }
    }
}

impl DetectionConfig {
    pub fn sensitivity(&self) -> Sensitivity {
        Sensitivity {
            std_fraction: self.sensitivity,
            min_margin: self.min_margin,
        }
    }
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Normalized value at the edge of a two-sided band
    #[serde(default = "default_edge_score")]
    pub edge_score: f64,

    /// Decay per band-width of excess outside the limits
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    #[serde(default = "default_excellent_min")]
    pub excellent_min: f64,

    #[serde(default = "default_monitoring_min")]
    pub monitoring_min: f64,
}

fn default_edge_score() -> f64 {
    defaults::DEFAULT_EDGE_SCORE
}
fn default_decay_rate() -> f64 {
    defaults::DEFAULT_DECAY_RATE
}
fn default_excellent_min() -> f64 {
    defaults::DEFAULT_EXCELLENT_MIN
}
fn default_monitoring_min() -> f64 {
    defaults::DEFAULT_MONITORING_MIN
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            edge_score: default_edge_score(),
            decay_rate: default_decay_rate(),
            excellent_min: default_excellent_min(),
            monitoring_min: default_monitoring_min(),
        }
    }
}

// ============================================================================
// Insights
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsConfig {
    /// Raise a technician check when peaks + lows exceed this share of rows
    #[serde(default = "default_action_ratio")]
    pub action_ratio: f64,

    #[serde(default = "default_remedy")]
    pub default_remedy: String,
}

fn default_action_ratio() -> f64 {
    defaults::DEFAULT_ACTION_RATIO
}
fn default_remedy() -> String {
    defaults::DEFAULT_REMEDY.to_string()
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            action_ratio: default_action_ratio(),
            default_remedy: default_remedy(),
        }
    }
}

// ============================================================================
// Forecast
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_min_points")]
    pub min_points: usize,

    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,

    /// Maximum p-value for the trend to be trusted
    #[serde(default = "default_significance")]
    pub significance: f64,
}

fn default_min_points() -> usize {
    defaults::DEFAULT_FORECAST_MIN_POINTS
}
fn default_horizon_days() -> u32 {
    defaults::DEFAULT_FORECAST_HORIZON_DAYS
}
fn default_significance() -> f64 {
    defaults::DEFAULT_FORECAST_SIGNIFICANCE
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_points: default_min_points(),
            horizon_days: default_horizon_days(),
            significance: default_significance(),
        }
    }
}
