//! Min–max scaling to the unit interval

use crate::error::{ForecastError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    /// Learn the range of `values`
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(ForecastError::ValidationError(
                "Cannot scale an empty series".to_string(),
            ));
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(Self { min, max })
    }

    /// Width of the fitted range; a constant series scales by one
    fn scale(&self) -> f64 {
        let range = self.max - self.min;
        if range > f64::EPSILON {
            range
        } else {
            1.0
        }
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.min) / self.scale()
    }

    pub fn inverse_transform(&self, value: f64) -> f64 {
        value * self.scale() + self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_maps_range_to_unit_interval() {
        let scaler = MinMaxScaler::fit(&[10.0, 15.0, 20.0]).unwrap();
        assert_eq!(scaler.transform(10.0), 0.0);
        assert_eq!(scaler.transform(20.0), 1.0);
        assert_abs_diff_eq!(scaler.inverse_transform(scaler.transform(13.7)), 13.7, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_series() {
        let scaler = MinMaxScaler::fit(&[4.0; 5]).unwrap();
        assert_eq!(scaler.transform(4.0), 0.0);
        assert_eq!(scaler.inverse_transform(0.0), 4.0);
        assert!(MinMaxScaler::fit(&[]).is_err());
    }
}
