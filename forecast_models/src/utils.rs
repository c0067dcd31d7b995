//! Utility functions for forecasting

use crate::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};

/// Calendar dates following `base_date`, one per forecast step.
///
/// Dates advance by calendar day; weekends and holidays are not skipped.
pub fn future_dates(base_date: NaiveDate, horizons: usize) -> Result<Vec<NaiveDate>> {
    (1..=horizons as u64)
        .map(|k| {
            base_date.checked_add_days(Days::new(k)).ok_or_else(|| {
                ForecastError::InvalidParameter(format!(
                    "Forecast date {} days after {} is out of range",
                    k, base_date
                ))
            })
        })
        .collect()
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Round to cents
pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

/// Drop non-finite values to `None` so they serialise as JSON null
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
