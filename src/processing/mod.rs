//! KPI processing - threshold classification, extremum detection, health
//! scoring and breach forecasting
//!
//! Every function here is pure over explicit inputs; the threshold and
//! weight tables are passed in by reference.

pub mod classifier;
pub mod extrema;
pub mod health_scoring;
pub mod trend;

pub use classifier::{classify_reading, classify_value};
pub use extrema::{detect_extrema, detect_extrema_in_values, series_order, FlaggedPoint, Sensitivity};
pub use health_scoring::{normalize_value, score_equipment, score_fleet, status_from_score, ScoringError};
pub use trend::{fit_trend, forecast_breach, BreachForecast, TrendFit};
