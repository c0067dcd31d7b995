//! Trailing-trend extrapolation used as a dependency-light fallback

use super::{ForecastModel, ForecastResult, TrainedForecastModel};
use crate::data::LinearParams;
use crate::error::{ForecastError, Result};

/// Number of observations spanned by the trailing trend
pub const TREND_WINDOW: usize = 10;

/// Untrained trend estimator
#[derive(Debug, Clone)]
pub struct LinearTrendModel {
    band_fraction: f64,
}

impl LinearTrendModel {
    /// `band_fraction` is the band half-width relative to the predicted price
    pub fn new(band_fraction: f64) -> Result<Self> {
        if !(band_fraction >= 0.0 && band_fraction < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Band fraction must be in [0, 1), got {}",
                band_fraction
            )));
        }
        Ok(Self { band_fraction })
    }

    pub fn from_params(params: &LinearParams) -> Result<Self> {
        Self::new(params.band_fraction)
    }
}

impl Default for LinearTrendModel {
    fn default() -> Self {
        Self {
            band_fraction: 0.05,
        }
    }
}

impl ForecastModel for LinearTrendModel {
    type Trained = TrainedLinearTrend;
    const MODEL_TYPE: &'static str = "SIMPLE_TREND";

    fn train(&self, prices: &[f64]) -> Result<Self::Trained> {
        let last = *prices.last().ok_or_else(|| {
            ForecastError::ValidationError("Price series is empty".to_string())
        })?;
        let average = prices.iter().sum::<f64>() / prices.len() as f64;

        // Per-step slope across the last TREND_WINDOW observations
        let trend = if prices.len() >= TREND_WINDOW {
            (last - prices[prices.len() - TREND_WINDOW]) / (TREND_WINDOW - 1) as f64
        } else {
            0.0
        };

        Ok(TrainedLinearTrend {
            average,
            last,
            trend,
            data_points: prices.len(),
            band_fraction: self.band_fraction,
        })
    }

    fn min_observations(&self) -> usize {
        1
    }

    fn name(&self) -> String {
        "SimpleTrend".to_string()
    }
}

/// Fitted trend: average, last price and slope
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedLinearTrend {
    average: f64,
    last: f64,
    trend: f64,
    data_points: usize,
    band_fraction: f64,
}

impl TrainedLinearTrend {
    pub fn average(&self) -> f64 {
        self.average
    }

    pub fn last(&self) -> f64 {
        self.last
    }

    pub fn trend(&self) -> f64 {
        self.trend
    }

    pub fn data_points(&self) -> usize {
        self.data_points
    }

    /// Band half-width around a predicted price
    pub fn margin(&self, predicted: f64) -> f64 {
        (predicted * self.band_fraction).abs()
    }
}

impl TrainedForecastModel for TrainedLinearTrend {
    fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        let values = (1..=horizons)
            .map(|k| self.last + self.trend * k as f64)
            .collect();
        ForecastResult::new(values, horizons)
    }

    fn name(&self) -> String {
        "SimpleTrend".to_string()
    }
}
