//! Health Scoring Module
//!
//! Deterministic, weighted health score per equipment from the most recent
//! reading of each KPI:
//!
//! ```text
//! score = 100 × Σ(weight_k × normalized_k) / Σ weight_k
//! ```
//!
//! KPIs without a threshold band or without a positive weight are left out of
//! both sums. An equipment with nothing left to score is `InsufficientData`,
//! never 0 or 100.
//!
//! # Normalization
//!
//! - Two-sided band: 1.0 at the centre, linear down to `edge_score` at
//!   either bound.
//! - One-sided band: 1.0 anywhere on the allowed side.
//! - Outside any band: `start × exp(-decay_rate × excess / scale)` where
//!   `start` is the value at the bound (`edge_score` or 1.0) and `scale` is
//!   the band width, or |bound| for one-sided bands (1.0 when zero).

use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::HealthConfig;
use crate::types::{
    ClassifiedReading, EquipmentHealthScore, HealthStatus, KpiContribution, ThresholdBand,
    ThresholdTable, WeightTable,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    #[error("Insufficient data for '{equipment_id}': no KPI with both a threshold band and a weight")]
    InsufficientData { equipment_id: String },
}

/// Map a value to [0, 1] by its position relative to `band`.
pub fn normalize_value(value: f64, band: &ThresholdBand, params: &HealthConfig) -> f64 {
    let (start, excess, scale) = match (band.low, band.high) {
        (Some(lo), Some(hi)) => {
            if value >= lo && value <= hi {
                let half = (hi - lo) / 2.0;
                if half <= 0.0 {
                    return 1.0;
                }
                let offset = ((value - (lo + hi) / 2.0).abs() / half).min(1.0);
                return 1.0 - (1.0 - params.edge_score) * offset;
            }
            let excess = if value < lo { lo - value } else { value - hi };
            (params.edge_score, excess, hi - lo)
        }
        (Some(lo), None) => {
            if value >= lo {
                return 1.0;
            }
            (1.0, lo - value, lo.abs())
        }
        (None, Some(hi)) => {
            if value <= hi {
                return 1.0;
            }
            (1.0, value - hi, hi.abs())
        }
        (None, None) => return 1.0,
    };

    let scale = if scale > 0.0 { scale } else { 1.0 };
    (start * (-params.decay_rate * excess / scale).exp()).clamp(0.0, 1.0)
}

/// Bucket a 0-100 score.
pub fn status_from_score(score: f64, params: &HealthConfig) -> HealthStatus {
    if score >= params.excellent_min {
        HealthStatus::Excellent
    } else if score >= params.monitoring_min {
        HealthStatus::NeedsMonitoring
    } else {
        HealthStatus::Critical
    }
}

/// Latest date and the mean value on that date (one reading per floor).
fn latest_value(readings: &[&ClassifiedReading]) -> Option<(NaiveDate, f64)> {
    let latest = readings.iter().map(|r| r.reading.date).max()?;
    let on_latest: Vec<f64> = readings
        .iter()
        .filter(|r| r.reading.date == latest)
        .map(|r| r.reading.value)
        .collect();
    #[allow(clippy::cast_precision_loss)]
    let mean = on_latest.iter().sum::<f64>() / on_latest.len() as f64;
    Some((latest, mean))
}

/// Score one equipment. Readings for other equipment ids are ignored.
pub fn score_equipment(
    equipment_id: &str,
    readings: &[ClassifiedReading],
    thresholds: &ThresholdTable,
    weights: &WeightTable,
    params: &HealthConfig,
) -> Result<EquipmentHealthScore, ScoringError> {
    // Canonical KPI → readings; BTreeMap keeps contributions ordered
    let mut by_kpi: BTreeMap<String, Vec<&ClassifiedReading>> = BTreeMap::new();
    for r in readings.iter().filter(|r| r.reading.equipment_id == equipment_id) {
        by_kpi
            .entry(thresholds.canonical_key(&r.reading.kpi))
            .or_default()
            .push(r);
    }

    let mut contributions = Vec::new();
    for (kpi, group) in &by_kpi {
        let Some(band) = thresholds.get(kpi) else {
            continue;
        };
        let Some(weight) = weights.get(kpi).filter(|w| w.is_finite() && *w > 0.0) else {
            continue;
        };
        let Some((date, value)) = latest_value(group) else {
            continue;
        };
        contributions.push(KpiContribution {
            kpi: kpi.clone(),
            weight,
            normalized_value: normalize_value(value, band, params),
            value,
            date,
        });
    }

    if contributions.is_empty() {
        info!(equipment = equipment_id, kpis = by_kpi.len(), "Equipment not scorable");
        return Err(ScoringError::InsufficientData {
            equipment_id: equipment_id.to_string(),
        });
    }

    let weight_sum: f64 = contributions.iter().map(|c| c.weight).sum();
    let weighted: f64 = contributions
        .iter()
        .map(|c| c.weight * c.normalized_value)
        .sum();
    let score = (100.0 * weighted / weight_sum).clamp(0.0, 100.0);
    let status = status_from_score(score, params);

    debug!(
        equipment = equipment_id,
        score,
        status = %status,
        kpis = contributions.len(),
        "Equipment scored"
    );

    Ok(EquipmentHealthScore {
        equipment_id: equipment_id.to_string(),
        score,
        status,
        contributing_kpis: contributions,
    })
}

/// Score every equipment in `readings` independently, in parallel.
///
/// One equipment failing with `InsufficientData` does not affect the others.
/// Output is ordered by equipment id.
pub fn score_fleet(
    readings: &[ClassifiedReading],
    thresholds: &ThresholdTable,
    weights: &WeightTable,
    params: &HealthConfig,
) -> Vec<(String, Result<EquipmentHealthScore, ScoringError>)> {
    let mut groups: BTreeMap<&str, Vec<ClassifiedReading>> = BTreeMap::new();
    for r in readings {
        groups
            .entry(r.reading.equipment_id.as_str())
            .or_default()
            .push(r.clone());
    }
    let groups: Vec<(&str, Vec<ClassifiedReading>)> = groups.into_iter().collect();

    groups
        .par_iter()
        .map(|(id, group)| {
            let result = score_equipment(id, group, thresholds, weights, params);
            ((*id).to_string(), result)
        })
        .collect()
}
