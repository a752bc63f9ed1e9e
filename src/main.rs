//! ckpi-analyzer - elevator maintenance KPI analysis
//!
//! Reads a CKPI export, detects its column layout, classifies every reading
//! against the KPI threshold catalogue, flags peaks and lows, scores each
//! equipment and projects threshold breaches.
//!
//! # Usage
//!
//! ```bash
//! # Analyze an export with the default (or ./kpi_config.toml) catalogue
//! ckpi-analyzer analyze ckpi_export.csv
//!
//! # Past 3 months only, JSON output, custom catalogue
//! ckpi-analyzer analyze data.json --range quarter --json --config site.toml
//!
//! # Validate a catalogue / print the built-in one
//! ckpi-analyzer check-config site.toml
//! ckpi-analyzer default-config > kpi_config.toml
//! ```
//!
//! # Environment Variables
//!
//! - `CKPI_CONFIG`: Path to the KPI catalogue (TOML)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use ckpi_analyzer::ingest::{self, DateOrder, Diagnostics, SchemaMapping};
use ckpi_analyzer::pipeline::{
    action_items, DateRange, GroupSummary, RangePreset, ReadingFilter, SeriesForecast,
};
use ckpi_analyzer::{ClassifiedReading, EquipmentHealthScore, KpiConfig, KpiPipeline};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "ckpi-analyzer")]
#[command(about = "Elevator maintenance KPI trend and health analysis")]
#[command(version)]
struct CliArgs {
    #[command(subcommand)]
    command: SubCommand,
}

#[derive(Subcommand, Debug)]
enum SubCommand {
    /// Analyze a CKPI export (.csv, .json or .xlsx)
    Analyze {
        /// Input file
        file: PathBuf,

        /// KPI catalogue (default: $CKPI_CONFIG, then ./kpi_config.toml, then built-in)
        #[arg(long, env = "CKPI_CONFIG")]
        config: Option<PathBuf>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Peak/low margin as a fraction of the series standard deviation
        #[arg(long)]
        sensitivity: Option<f64>,

        /// Read ambiguous dates such as 03/04/2024 as month first
        #[arg(long)]
        month_first: bool,

        /// Look-back window anchored on the latest date in the data
        #[arg(long, value_enum)]
        range: Option<RangeArg>,
    },

    /// Load and validate a KPI catalogue, printing warnings
    CheckConfig {
        /// Catalogue path (default: ./kpi_config.toml)
        path: Option<PathBuf>,
    },

    /// Print the built-in KPI catalogue as TOML
    DefaultConfig,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RangeArg {
    Week,
    Month,
    Quarter,
    HalfYear,
    Year,
}

impl From<RangeArg> for RangePreset {
    fn from(arg: RangeArg) -> Self {
        match arg {
            RangeArg::Week => Self::Week,
            RangeArg::Month => Self::Month,
            RangeArg::Quarter => Self::Quarter,
            RangeArg::HalfYear => Self::HalfYear,
            RangeArg::Year => Self::Year,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Serialize)]
struct ScoreEntry {
    equipment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<EquipmentHealthScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnalysisReport {
    source: PathBuf,
    mapping: SchemaMapping,
    diagnostics: Diagnostics,
    range: Option<DateRange>,
    summaries: Vec<GroupSummary>,
    scores: Vec<ScoreEntry>,
    forecasts: Vec<SeriesForecast>,
}

// ============================================================================
// Commands
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<KpiConfig> {
    match path {
        Some(p) => KpiConfig::load_from_file(p)
            .with_context(|| format!("Failed to load KPI config from {}", p.display())),
        None => Ok(KpiConfig::load()),
    }
}

/// Catalogue plus command-line overrides, validated together.
fn analysis_config(
    config_path: Option<&Path>,
    sensitivity: Option<f64>,
    month_first: bool,
) -> Result<KpiConfig> {
    let mut config = load_config(config_path)?;
    if let Some(s) = sensitivity {
        config.detection.sensitivity = s;
    }
    if month_first {
        config.dates.ambiguous_order = DateOrder::MonthFirst;
    }
    config.validate().context("Invalid analysis settings")?;
    Ok(config)
}

fn run_analyze(file: &Path, pipeline: &KpiPipeline, range: Option<RangeArg>) -> Result<AnalysisReport> {
    let table = ingest::read_path(file)?;
    let mut outcome = pipeline.classify(&table)?;
    if !outcome.diagnostics.is_clean() {
        warn!("{}", outcome.diagnostics.summary());
    }

    let window = match (range, outcome.latest_date()) {
        (Some(preset), Some(latest)) => Some(DateRange::preset(latest, preset.into())),
        _ => None,
    };
    if let Some(window) = window {
        info!(start = %window.start, end = %window.end, "Applying date range");
        let filter = ReadingFilter {
            range: Some(window),
            ..ReadingFilter::default()
        };
        outcome = pipeline.classify_window(&outcome, &filter);
    }

    let readings: Vec<ClassifiedReading> = outcome.readings().cloned().collect();
    let scores = pipeline
        .score_fleet(&readings)
        .into_iter()
        .map(|(equipment_id, result)| match result {
            Ok(score) => ScoreEntry {
                equipment_id,
                score: Some(score),
                error: None,
            },
            Err(e) => ScoreEntry {
                equipment_id,
                score: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok(AnalysisReport {
        source: file.to_path_buf(),
        summaries: pipeline.summarize(&outcome.groups),
        forecasts: pipeline.forecasts(&outcome.groups),
        mapping: outcome.mapping,
        diagnostics: outcome.diagnostics,
        range: window,
        scores,
    })
}

fn print_report(report: &AnalysisReport, config: &KpiConfig) {
    println!("Source:   {}", report.source.display());
    println!("Schema:   {}", report.mapping);
    println!(
        "Rows:     {} read, {} accepted ({})",
        report.diagnostics.total_rows,
        report.diagnostics.accepted_rows,
        report.diagnostics.summary()
    );
    for d in report.diagnostics.skipped.iter().take(10) {
        println!("          {d}");
    }
    if let Some(range) = &report.range {
        println!("Range:    {} .. {}", range.start, range.end);
    }

    println!();
    println!("Series");
    for s in &report.summaries {
        println!(
            "  {:<40} rows {:>4}  peaks {:>3}  lows {:>3}  outside {:>3}",
            format!(
                "{} / {} / {}",
                s.key.equipment_id,
                config.label_for(&s.key.kpi),
                s.key.floor.as_deref().unwrap_or("-")
            ),
            s.rows,
            s.peaks,
            s.lows,
            s.outside_limits
        );
    }

    let actions = action_items(&report.summaries);
    println!();
    println!("Action items ({})", actions.len());
    for a in actions {
        println!(
            "  [{} floor {}] {}: {} -> {}",
            a.key.equipment_id,
            a.key.floor.as_deref().unwrap_or("-"),
            a.kpi_label,
            a.action,
            a.remedy
        );
    }

    println!();
    println!("Health scores");
    for entry in &report.scores {
        match (&entry.score, &entry.error) {
            (Some(score), _) => println!(
                "  {:<20} {:>6.1}  {}  ({} KPIs)",
                entry.equipment_id,
                score.score,
                score.status,
                score.contributing_kpis.len()
            ),
            (None, Some(error)) => println!("  {:<20}   n/a   {error}", entry.equipment_id),
            (None, None) => {}
        }
    }

    if !report.forecasts.is_empty() {
        println!();
        println!("Projected breaches");
        for f in &report.forecasts {
            println!(
                "  {} / {} / {}: {:?} bound {} on {} ({} days)",
                f.key.equipment_id,
                config.label_for(&f.key.kpi),
                f.key.floor.as_deref().unwrap_or("-"),
                f.forecast.side,
                f.forecast.bound,
                f.forecast.breach_date,
                f.forecast.days_remaining
            );
        }
    }
}

fn run_check_config(path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or_else(|| Path::new("kpi_config.toml"));
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let (config, warnings) = KpiConfig::parse_with_warnings(&contents)
        .with_context(|| format!("Invalid KPI config {}", path.display()))?;

    println!("{}: OK ({} KPIs)", path.display(), config.kpis.len());
    for w in &warnings {
        println!("  warning: {w}");
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for the report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    match args.command {
        SubCommand::Analyze {
            file,
            config,
            json,
            sensitivity,
            month_first,
            range,
        } => {
            if sensitivity.is_some_and(|s| !s.is_finite() || s < 0.0) {
                bail!("--sensitivity must be a finite number >= 0");
            }
            let config = analysis_config(config.as_deref(), sensitivity, month_first)?;
            let pipeline = KpiPipeline::new(config);
            let report = run_analyze(&file, &pipeline, range)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report, pipeline.config());
            }
        }
        SubCommand::CheckConfig { path } => run_check_config(path.as_deref())?,
        SubCommand::DefaultConfig => print!("{}", KpiConfig::default().to_toml()?),
    }

    Ok(())
}
