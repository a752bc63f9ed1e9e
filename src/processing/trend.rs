//! Threshold breach forecasting from a linear KPI trend.
//!
//! Fits `value = intercept + slope × day` by least squares over one
//! (equipment, KPI, floor) series, keeps the fit only when the Pearson
//! correlation is significant (two-tailed Student's t via statrs), then walks
//! the projection forward day by day until it crosses the watched bound.
//!
//! The watched bound is the high limit when the band has one, otherwise the
//! low limit.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::debug;

use crate::config::ForecastConfig;
use crate::types::{BreachSide, ThresholdBand};

/// Least-squares line over (days since first reading, value).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendFit {
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub slope_per_day: f64,
    pub intercept: f64,
    pub r_value: f64,
    pub p_value: f64,
    pub sample_count: usize,
}

impl TrendFit {
    /// Projected value `days` after the first reading.
    pub fn predict(&self, days: i64) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let x = days as f64;
        self.intercept + self.slope_per_day * x
    }

    fn span_days(&self) -> i64 {
        (self.last_date - self.first_date).num_days()
    }
}

/// Projected first crossing of a threshold bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreachForecast {
    pub side: BreachSide,
    pub bound: f64,
    pub breach_date: NaiveDate,
    /// Days after the last reading
    pub days_remaining: u32,
    pub trend: TrendFit,
}

/// Fit a trend line. `None` with fewer than two distinct dates.
pub fn fit_trend(series: &[(NaiveDate, f64)]) -> Option<TrendFit> {
    let first_date = series.iter().map(|(d, _)| *d).min()?;
    let last_date = series.iter().map(|(d, _)| *d).max()?;
    if first_date == last_date {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let xs: Vec<f64> = series
        .iter()
        .map(|(d, _)| (*d - first_date).num_days() as f64)
        .collect();
    let ys: Vec<f64> = series.iter().map(|(_, v)| *v).collect();

    #[allow(clippy::cast_precision_loss)]
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(&ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let r = if syy == 0.0 { 0.0 } else { sxy / (sxx * syy).sqrt() };

    Some(TrendFit {
        first_date,
        last_date,
        slope_per_day: slope,
        intercept,
        r_value: r,
        p_value: p_value_for_r(r, series.len()),
        sample_count: series.len(),
    })
}

/// Two-tailed p-value for a Pearson r over `n` samples.
///
/// t = r × sqrt(n-2) / sqrt(1-r²), with n-2 degrees of freedom.
pub fn p_value_for_r(r: f64, n: usize) -> f64 {
    if n < 3 || !r.is_finite() {
        return 1.0;
    }
    if r.abs() >= 0.9999 {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let df = (n - 2) as f64;
    let t_stat = r * df.sqrt() / (1.0 - r * r).sqrt();

    match StudentsT::new(0.0, 1.0, df) {
        Ok(t_dist) => 2.0 * (1.0 - t_dist.cdf(t_stat.abs())),
        Err(_) => 1.0,
    }
}

/// Forecast the first projected breach of `band` within the horizon.
///
/// `None` when the series is too short, the trend is not significant, or
/// the projection stays inside the watched bound for the whole horizon.
pub fn forecast_breach(
    series: &[(NaiveDate, f64)],
    band: &ThresholdBand,
    params: &ForecastConfig,
) -> Option<BreachForecast> {
    if series.len() < params.min_points {
        return None;
    }
    let trend = fit_trend(series)?;
    if trend.p_value >= params.significance {
        debug!(
            p_value = trend.p_value,
            samples = trend.sample_count,
            "Trend not significant, no forecast"
        );
        return None;
    }

    let (side, bound) = match (band.high, band.low) {
        (Some(high), _) => (BreachSide::High, high),
        (None, Some(low)) => (BreachSide::Low, low),
        (None, None) => return None,
    };
    let crosses = |v: f64| match side {
        BreachSide::High => v > bound,
        BreachSide::Low => v < bound,
    };

    let span = trend.span_days();
    let days_remaining = (1..=params.horizon_days)
        .find(|&d| crosses(trend.predict(span + i64::from(d))))?;
    let breach_date = trend
        .last_date
        .checked_add_days(Days::new(u64::from(days_remaining)))?;

    Some(BreachForecast {
        side,
        bound,
        breach_date,
        days_remaining,
        trend,
    })
}
