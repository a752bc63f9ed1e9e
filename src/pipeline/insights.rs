//! Actionable insights per series.
//!
//! A series with many extrema relative to its length is noisy enough to send
//! a technician:
//!
//! ```text
//! peaks + lows > rows × action_ratio   →   ActionItem
//! ```

use serde::Serialize;
use tracing::debug;

use crate::config::defaults::ACTION_TECHNICIAN_CHECK;
use crate::config::KpiConfig;
use crate::types::SeriesKey;

use super::SeriesGroup;

/// Recommended follow-up for one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionItem {
    pub key: SeriesKey,
    /// Display label of the KPI
    pub kpi_label: String,
    pub action: String,
    pub remedy: String,
}

/// Counts for one (equipment, KPI, floor) series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: SeriesKey,
    pub rows: usize,
    pub peaks: usize,
    pub lows: usize,
    pub outside_limits: usize,
    pub action: Option<ActionItem>,
}

impl GroupSummary {
    pub fn extrema(&self) -> usize {
        self.peaks + self.lows
    }
}

/// Summarize every group, attaching an action item where warranted.
pub fn summarize(groups: &[SeriesGroup], config: &KpiConfig) -> Vec<GroupSummary> {
    groups
        .iter()
        .filter(|g| !g.readings.is_empty())
        .map(|g| {
            let rows = g.readings.len();
            let peaks = g.peak_count();
            let lows = g.low_count();
            let outside_limits = g.readings.iter().filter(|r| r.is_outside_limits()).count();

            #[allow(clippy::cast_precision_loss)]
            let needs_action = (peaks + lows) as f64 > rows as f64 * config.insights.action_ratio;
            let action = needs_action.then(|| {
                debug!(series = %g.key, peaks, lows, rows, "Action item raised");
                ActionItem {
                    key: g.key.clone(),
                    kpi_label: config.label_for(&g.key.kpi).to_string(),
                    action: ACTION_TECHNICIAN_CHECK.to_string(),
                    remedy: config.remedy_for(&g.key.kpi).to_string(),
                }
            });

            GroupSummary {
                key: g.key.clone(),
                rows,
                peaks,
                lows,
                outside_limits,
                action,
            }
        })
        .collect()
}

/// Action items out of a summary list, in summary order.
pub fn action_items(summaries: &[GroupSummary]) -> Vec<&ActionItem> {
    summaries.iter().filter_map(|s| s.action.as_ref()).collect()
}
