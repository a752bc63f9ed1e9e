//! KPI Configuration Module
//!
//! Provides the KPI catalogue (threshold bands, weights, remedies) and the
//! pipeline tuning values, loaded from TOML so operators can adjust limits
//! without a rebuild.
//!
//! ## Loading Order
//!
//! 1. `CKPI_CONFIG` environment variable (path to TOML file)
//! 2. `kpi_config.toml` in the current working directory
//! 3. Built-in defaults (the six door-system KPIs)
//!
//! ## Usage
//!
//! Load once at startup and hand the value down by reference:
//!
//! ```ignore
//! let config = KpiConfig::load();
//! let outcome = pipeline::classify(&table, &config)?;
//! let thresholds = config.threshold_table();
//! ```

mod kpi_config;
pub mod defaults;
pub mod validation;

pub use kpi_config::*;
