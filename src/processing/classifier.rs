//! Threshold Classifier
//!
//! Compares a value with its KPI's threshold band. Bounds are inclusive and
//! either bound may be open. Pure functions, no state.

use crate::types::{
    BreachSide, ClassifiedReading, LimitStatus, Reading, ReadingStatus, ThresholdBand,
    ThresholdTable,
};

/// Limit status of `value` against `band`; `Unclassified` without a band.
pub fn classify_value(value: f64, band: Option<&ThresholdBand>) -> LimitStatus {
    let Some(band) = band else {
        return LimitStatus::Unclassified;
    };
    if band.low.is_some_and(|low| value < low) {
        LimitStatus::OutsideLimits(BreachSide::Low)
    } else if band.high.is_some_and(|high| value > high) {
        LimitStatus::OutsideLimits(BreachSide::High)
    } else {
        LimitStatus::WithinLimits
    }
}

/// Classify one reading; the extremum flag is left unset.
pub fn classify_reading(reading: Reading, thresholds: &ThresholdTable) -> ClassifiedReading {
    let limit = classify_value(reading.value, thresholds.get(&reading.kpi));
    ClassifiedReading {
        reading,
        status: ReadingStatus::new(limit),
    }
}
