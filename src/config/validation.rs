//! Config validation: unknown-key detection with Levenshtein suggestions
//! and suspicious-value checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Fixed dotted key paths of `KpiConfig`, excluding the per-KPI tables.
///
/// Maintained manually to match the struct hierarchy in kpi_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [dates]
        "dates",
        "dates.ambiguous_order",
        // [detection]
        "detection",
        "detection.sensitivity",
        "detection.min_margin",
        // [health]
        "health",
        "health.edge_score",
        "health.decay_rate",
        "health.excellent_min",
        "health.monitoring_min",
        // [insights]
        "insights",
        "insights.action_ratio",
        "insights.default_remedy",
        // [forecast]
        "forecast",
        "forecast.min_points",
        "forecast.horizon_days",
        "forecast.significance",
        // [kpis]
        "kpis",
    ];
    keys.iter().copied().collect()
}

/// Field names allowed inside each `[kpis.<name>]` table.
pub fn known_kpi_fields() -> HashSet<&'static str> {
    ["label", "low", "high", "weight", "aliases", "remedy"]
        .into_iter()
        .collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

/// Dotted paths of every float that is NaN or infinite.
pub fn non_finite_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    match value {
        toml::Value::Float(f) if !f.is_finite() => keys.push(prefix.to_string()),
        toml::Value::Table(table) => {
            for (k, v) in table {
                let path = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                keys.extend(non_finite_keys(v, &path));
            }
        }
        toml::Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                keys.extend(non_finite_keys(v, &format!("{prefix}[{i}]")));
            }
        }
        _ => {}
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction<'a, I>(unknown: &str, known: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&str, usize)> = None;
    for k in known {
        let dist = levenshtein(unknown, k);
        if dist <= 3 && best.map_or(true, |(_, best_dist)| dist < best_dist) {
            best = Some((k, dist));
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Keys under `kpis.<name>.` are checked against the KPI field set; the KPI
/// names themselves are free-form. This does NOT fail on unknown keys.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let kpi_fields = known_kpi_fields();
    let mut warnings = Vec::new();

    for key in walk_toml_keys(&value, "") {
        let parts: Vec<&str> = key.splitn(3, '.').collect();
        let unknown_suggestion = match parts.as_slice() {
            ["kpis", _name] => None,
            ["kpis", name, field] => {
                if kpi_fields.contains(field) {
                    None
                } else {
                    Some(
                        suggest_correction(field, kpi_fields.iter().copied())
                            .map(|f| format!("kpis.{name}.{f}")),
                    )
                }
            }
            _ => {
                if known.contains(key.as_str()) {
                    None
                } else {
                    Some(suggest_correction(&key, known.iter().copied()))
                }
            }
        };

        if let Some(suggestion) = unknown_suggestion {
            warnings.push(ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            });
        }
    }

    warnings
}

// ============================================================================
// Suspicious Value Checks
// ============================================================================

/// Warnings for values that are legal but probably not intended.
pub fn validate_ranges(config: &super::KpiConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for (name, kpi) in &config.kpis {
        if kpi.weight == 0.0 {
            warnings.push(ValidationWarning {
                field: format!("kpis.{name}.weight"),
                message: format!("kpis.{name}.weight = 0 excludes the KPI from health scoring"),
                suggestion: None,
            });
        }
        if let (Some(lo), Some(hi)) = (kpi.low, kpi.high) {
            if lo == hi {
                warnings.push(ValidationWarning {
                    field: format!("kpis.{name}"),
                    message: format!(
                        "kpis.{name} has a zero-width band ({lo}); only exact values are within limits"
                    ),
                    suggestion: None,
                });
            }
        }
    }

    if config.detection.sensitivity > 5.0 {
        warnings.push(ValidationWarning {
            field: "detection.sensitivity".to_string(),
            message: format!(
                "detection.sensitivity = {:.1} is above the typical range (0.5-3.0); few extrema will be flagged",
                config.detection.sensitivity
            ),
            suggestion: None,
        });
    }

    if config.kpis.values().all(|kpi| kpi.weight == 0.0) {
        warnings.push(ValidationWarning {
            field: "kpis".to_string(),
            message: "no KPI has a positive weight; every health score will be InsufficientData"
                .to_string(),
            suggestion: None,
        });
    }

    warnings
}

// ============================================================================
// Tests
// ============================================================================
