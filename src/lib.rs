//! CKPI Analyzer: elevator maintenance KPI trend and health analysis
//!
//! Turns a raw KPI export (CSV or JSON) into classified readings, peak/low
//! flags, per-equipment health scores, threshold breach forecasts and action
//! items.
//!
//! ## Architecture
//!
//! - **Ingest**: table reading, schema detection, date normalization, record building
//! - **Processing**: threshold classification, peak/low detection, health scoring, trend forecasting
//! - **Pipeline**: orchestration, filtering and insights over the above
//! - **Config**: TOML KPI catalogue loaded once and passed by reference
//!
//! ## Usage
//!
//! ```no_run
//! use ckpi_analyzer::{ingest, KpiConfig, KpiPipeline};
//!
//! let pipeline = KpiPipeline::new(KpiConfig::load());
//! let table = ingest::read_path("ckpi_export.csv".as_ref())?;
//! let outcome = pipeline.classify(&table)?;
//! println!("{}", outcome.diagnostics.summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod ingest;
pub mod pipeline;
pub mod processing;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, KpiConfig, KpiDefinition};

// Re-export commonly used types
pub use types::{
    Cell, ClassifiedReading, EquipmentHealthScore, Extremum, HealthStatus, KpiContribution,
    LimitStatus, RawTable, Reading, SeriesKey, StatusFlag, ThresholdBand, ThresholdTable,
    WeightTable,
};

// Re-export errors
pub use ingest::{DateParseError, RowError, SchemaError, TableError};
pub use processing::ScoringError;

// Re-export pipeline entry points
pub use pipeline::{
    classify, detect_extrema, score, score_fleet, ClassificationOutcome, KpiPipeline,
    SeriesGroup, Sensitivity,
};
