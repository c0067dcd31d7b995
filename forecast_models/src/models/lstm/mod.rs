//! Stacked LSTM regressor over sliding windows of scaled prices
//!
//! Prices are min–max scaled, cut into windows of `lookback` observations
//! that each predict the next price, and split chronologically into a
//! training and a validation partition. The network is a burn module
//! trained with Adam under early stopping, and forecasts are produced
//! recursively by feeding each prediction back into the window.
//!
//! Runs are reproducible only when a seed is given; otherwise one is drawn
//! from the operating system and reported through [`TrainedLstm::seed`].

mod network;
mod scaler;
mod training;

pub use network::{InferenceBackend, LstmNetwork, TrainingBackend, DENSE_UNITS};
pub use scaler::MinMaxScaler;
pub use training::{TrainingConfig, TrainingHistory};

use super::{ForecastModel, ForecastResult, TrainedForecastModel};
use crate::data::LstmParams;
use crate::error::{ForecastError, Result};
use forecast_math::std_dev;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use network::DEVICE;
use training::{with_seed, Dataset};

/// Minimum number of prices accepted by the LSTM predictor
pub const LSTM_MIN_OBSERVATIONS: usize = 100;

/// Fraction of the predicted path's spread used as the per-step standard error
pub const BAND_SPREAD_FACTOR: f64 = 0.1;

/// Untrained LSTM configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LstmModel {
    lookback: usize,
    units: usize,
    dropout: f64,
    validation_split: f64,
    seed: Option<u64>,
    training: TrainingConfig,
}

impl LstmModel {
    pub fn new(params: &LstmParams) -> Result<Self> {
        if params.lookback == 0 {
            return Err(ForecastError::InvalidParameter(
                "lookback must be at least 1".to_string(),
            ));
        }
        if params.units < 4 {
            return Err(ForecastError::InvalidParameter(format!(
                "units must be at least 4, got {}",
                params.units
            )));
        }
        if params.epochs == 0 || params.batch_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "epochs and batch_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&params.dropout) {
            return Err(ForecastError::InvalidParameter(format!(
                "dropout must be in [0, 1), got {}",
                params.dropout
            )));
        }
        if !(params.learning_rate > 0.0 && params.learning_rate.is_finite()) {
            return Err(ForecastError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                params.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&params.validation_split) {
            return Err(ForecastError::InvalidParameter(format!(
                "validation_split must be in [0, 1), got {}",
                params.validation_split
            )));
        }

        Ok(Self {
            lookback: params.lookback,
            units: params.units,
            dropout: params.dropout,
            validation_split: params.validation_split,
            seed: params.seed,
            training: TrainingConfig {
                epochs: params.epochs,
                batch_size: params.batch_size,
                learning_rate: params.learning_rate,
                ..TrainingConfig::default()
            },
        })
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    pub fn units(&self) -> usize {
        self.units
    }

    /// Split scaled prices into chronological training and validation windows
    fn datasets(&self, scaled: &[f64]) -> Result<(Dataset, Option<Dataset>)> {
        let samples = scaled.len() - self.lookback;
        let validation = (self.validation_split * samples as f64).ceil() as usize;
        let train = samples.saturating_sub(validation);
        if train == 0 {
            return Err(ForecastError::ValidationError(format!(
                "{} windows leave nothing to train on after a validation split of {}",
                samples, self.validation_split
            )));
        }

        let build = |range: std::ops::Range<usize>| Dataset {
            windows: Array2::from_shape_fn((range.len(), self.lookback), |(i, t)| {
                scaled[range.start + i + t]
            }),
            targets: range.map(|i| scaled[i + self.lookback]).collect(),
        };

        let validation = (validation > 0).then(|| build(train..samples));
        Ok((build(0..train), validation))
    }
}

impl ForecastModel for LstmModel {
    type Trained = TrainedLstm;
    const MODEL_TYPE: &'static str = "LSTM";

    fn train(&self, prices: &[f64]) -> Result<Self::Trained> {
        if self.lookback >= prices.len() {
            return Err(ForecastError::ValidationError(format!(
                "lookback ({}) must be smaller than the number of prices ({})",
                self.lookback,
                prices.len()
            )));
        }

        let seed = self.seed.unwrap_or_else(rand::random::<u64>);
        let mut rng = StdRng::seed_from_u64(seed);

        let scaler = MinMaxScaler::fit(prices)?;
        let scaled: Vec<f64> = prices.iter().map(|&p| scaler.transform(p)).collect();
        let (train, validation) = self.datasets(&scaled)?;
        log::info!(
            "Training LSTM({}) on {} windows, {} held out, seed {}",
            self.units,
            train.len(),
            validation.as_ref().map_or(0, Dataset::len),
            seed
        );

        let (network, history) = with_seed(seed, || {
            let network = LstmNetwork::<TrainingBackend>::new(self.units, self.dropout, &DEVICE);
            training::fit(
                network,
                &train,
                validation.as_ref(),
                &self.training,
                &mut rng,
            )
        })?;
        log::info!(
            "Trained {} epochs, best at epoch {}",
            history.epochs_trained(),
            history.best_epoch + 1
        );

        Ok(TrainedLstm {
            network,
            scaler,
            window: scaled[scaled.len() - self.lookback..].to_vec(),
            history,
            seed,
            lookback: self.lookback,
            units: self.units,
        })
    }

    fn min_observations(&self) -> usize {
        LSTM_MIN_OBSERVATIONS
    }

    fn name(&self) -> String {
        format!("LSTM({}, lookback={})", self.units, self.lookback)
    }
}

/// Trained network together with the state needed to roll forecasts forward
#[derive(Debug, Clone)]
pub struct TrainedLstm {
    network: LstmNetwork<InferenceBackend>,
    scaler: MinMaxScaler,
    /// Last `lookback` scaled prices
    window: Vec<f64>,
    history: TrainingHistory,
    seed: u64,
    lookback: usize,
    units: usize,
}

impl TrainedLstm {
    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    /// Seed that produced this model
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    pub fn units(&self) -> usize {
        self.units
    }
}

impl TrainedForecastModel for TrainedLstm {
    fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        let mut window = self.window.clone();
        let mut values = Vec::with_capacity(horizons);

        for _ in 0..horizons {
            let input = Array2::from_shape_vec((1, self.lookback), window.clone())
                .map_err(|e| ForecastError::ModelError(e.to_string()))?;
            let next = self
                .network
                .predict(input.view(), &DEVICE)?
                .first()
                .copied()
                .unwrap_or(f64::NAN);
            if !next.is_finite() {
                return Err(ForecastError::ModelError(
                    "Network produced a non-finite prediction".to_string(),
                ));
            }
            values.push(self.scaler.inverse_transform(next));
            window.remove(0);
            window.push(next);
        }

        // Heuristic band: a fixed share of the spread of the predicted path
        let spread = if values.len() > 1 {
            std_dev(&values)?
        } else {
            0.0
        };
        let std_errors = vec![BAND_SPREAD_FACTOR * spread; horizons];
        ForecastResult::new_with_std_errors(values, horizons, std_errors)
    }

    fn name(&self) -> String {
        format!("LSTM({}, lookback={})", self.units, self.lookback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Predictor;

    fn small_params(seed: Option<u64>) -> LstmParams {
        LstmParams {
            lookback: 8,
            units: 8,
            epochs: 3,
            batch_size: 16,
            learning_rate: 0.01,
            seed,
            ..LstmParams::default()
        }
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 0.2 * i as f64 + 3.0 * (i as f64 * 0.25).sin())
            .collect()
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        let base = LstmParams::default();
        assert!(LstmModel::new(&LstmParams { units: 2, ..base.clone() }).is_err());
        assert!(LstmModel::new(&LstmParams { lookback: 0, ..base.clone() }).is_err());
        assert!(LstmModel::new(&LstmParams { dropout: 1.0, ..base.clone() }).is_err());
        assert!(LstmModel::new(&LstmParams { validation_split: 1.0, ..base.clone() }).is_err());
        assert!(LstmModel::new(&LstmParams { learning_rate: 0.0, ..base.clone() }).is_err());
        assert!(LstmModel::new(&base).is_ok());
    }

    #[test]
    fn test_chronological_split() {
        let model = LstmModel::new(&small_params(Some(1))).unwrap();
        let scaled: Vec<f64> = (0..108).map(|i| i as f64 / 107.0).collect();
        let (train, validation) = model.datasets(&scaled).unwrap();
        let validation = validation.unwrap();
        // 100 windows, ceil(0.2 * 100) held out from the tail
        assert_eq!(train.len(), 80);
        assert_eq!(validation.len(), 20);
        assert_eq!(train.targets[0], scaled[8]);
        assert_eq!(validation.windows[[0, 0]], scaled[80]);
        assert_eq!(*validation.targets.last().unwrap(), scaled[107]);
    }

    #[test]
    fn test_lookback_must_be_shorter_than_series() {
        let model = LstmModel::new(&LstmParams {
            lookback: 120,
            ..small_params(Some(1))
        })
        .unwrap();
        assert!(matches!(
            model.train(&wave(120)),
            Err(ForecastError::ValidationError(_))
        ));
    }

    #[test]
    fn test_below_minimum_is_rejected() {
        let mut predictor = Predictor::new(LstmModel::new(&small_params(Some(1))).unwrap());
        assert!(matches!(
            predictor.fit(&wave(99)),
            Err(ForecastError::InsufficientData { required: 100, .. })
        ));
    }

    #[test]
    fn test_fit_and_forecast() {
        let mut predictor = Predictor::new(LstmModel::new(&small_params(Some(42))).unwrap());
        let trained = predictor.fit(&wave(120)).unwrap();
        assert_eq!(trained.seed(), 42);
        assert!(trained.history().epochs_trained() >= 1);
        assert!(trained.history().best_val_loss().is_some());

        let forecast = predictor.forecast(5).unwrap();
        assert_eq!(forecast.values().len(), 5);
        assert!(forecast.values().iter().all(|v| v.is_finite()));
        let std_errors = forecast.std_errors().unwrap();
        assert!(std_errors.iter().all(|se| *se == std_errors[0] && *se >= 0.0));
    }

    #[test]
    fn test_seed_makes_runs_reproducible() {
        let prices = wave(110);
        let model = LstmModel::new(&small_params(Some(7))).unwrap();
        let first = model.train(&prices).unwrap().forecast(3).unwrap();
        let second = model.train(&prices).unwrap().forecast(3).unwrap();
        assert_eq!(first.values(), second.values());
    }

    #[test]
    fn test_missing_seed_is_drawn_and_reported() {
        let model = LstmModel::new(&LstmParams {
            epochs: 1,
            ..small_params(None)
        })
        .unwrap();
        let trained = model.train(&wave(100)).unwrap();
        let replay = LstmModel::new(&LstmParams {
            epochs: 1,
            ..small_params(Some(trained.seed()))
        })
        .unwrap()
        .train(&wave(100))
        .unwrap();
        assert_eq!(
            trained.forecast(2).unwrap().values(),
            replay.forecast(2).unwrap().values()
        );
    }
}
