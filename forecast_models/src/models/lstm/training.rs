//! Mini-batch training loop with early stopping and learning-rate decay

use super::network::{
    targets_tensor, windows_tensor, InferenceBackend, LstmNetwork, TrainingBackend, DEVICE,
};
use crate::error::{ForecastError, Result};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::ElementConversion;
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::Mutex;

/// The NdArray backend draws weights and dropout masks from one
/// process-wide generator; seeded runs hold this while they use it.
static BACKEND_RNG: Mutex<()> = Mutex::new(());

/// Optimisation and callback settings
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Epochs without improvement before training stops
    pub early_stopping_patience: usize,
    pub lr_factor: f64,
    /// Epochs without improvement before the learning rate is reduced
    pub lr_patience: usize,
    pub lr_min_delta: f64,
    pub min_learning_rate: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 32,
            learning_rate: 0.001,
            early_stopping_patience: 10,
            lr_factor: 0.5,
            lr_patience: 5,
            lr_min_delta: 1e-4,
            min_learning_rate: 1e-6,
        }
    }
}

/// Per-epoch record of a training run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    /// Mean training loss per epoch (with dropout active)
    pub loss: Vec<f64>,
    pub mae: Vec<f64>,
    /// Validation loss per epoch; empty without a validation set
    pub val_loss: Vec<f64>,
    pub learning_rates: Vec<f64>,
    /// Epoch whose weights were kept
    pub best_epoch: usize,
    pub stopped_early: bool,
}

impl TrainingHistory {
    pub fn epochs_trained(&self) -> usize {
        self.loss.len()
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.loss.last().copied()
    }

    pub fn final_mae(&self) -> Option<f64> {
        self.mae.last().copied()
    }

    pub fn best_val_loss(&self) -> Option<f64> {
        self.val_loss.iter().copied().reduce(f64::min)
    }

    pub fn final_learning_rate(&self) -> Option<f64> {
        self.learning_rates.last().copied()
    }
}

/// Windows and targets of one partition
#[derive(Debug, Clone)]
pub struct Dataset {
    pub windows: Array2<f64>,
    pub targets: Vec<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Stops once the monitored loss has not improved for `patience` epochs,
/// keeping a snapshot of the best weights seen
struct EarlyStopping<W> {
    patience: usize,
    best: f64,
    best_epoch: usize,
    wait: usize,
    best_weights: Option<W>,
}

impl<W> EarlyStopping<W> {
    fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f64::INFINITY,
            best_epoch: 0,
            wait: 0,
            best_weights: None,
        }
    }

    /// Record an epoch; returns true when training should stop
    fn update(&mut self, epoch: usize, value: f64, snapshot: impl FnOnce() -> W) -> bool {
        if value < self.best {
            self.best = value;
            self.best_epoch = epoch;
            self.wait = 0;
            self.best_weights = Some(snapshot());
            return false;
        }
        self.wait += 1;
        self.wait >= self.patience
    }
}

/// Halves the learning rate when the monitored loss plateaus
struct ReduceLrOnPlateau {
    factor: f64,
    patience: usize,
    min_delta: f64,
    min_lr: f64,
    best: f64,
    wait: usize,
}

impl ReduceLrOnPlateau {
    fn new(config: &TrainingConfig) -> Self {
        Self {
            factor: config.lr_factor,
            patience: config.lr_patience,
            min_delta: config.lr_min_delta,
            min_lr: config.min_learning_rate,
            best: f64::INFINITY,
            wait: 0,
        }
    }

    fn update(&mut self, value: f64, learning_rate: f64) -> f64 {
        if value < self.best - self.min_delta {
            self.best = value;
            self.wait = 0;
            return learning_rate;
        }
        self.wait += 1;
        if self.wait >= self.patience && learning_rate > self.min_lr {
            self.wait = 0;
            let reduced = (learning_rate * self.factor).max(self.min_lr);
            log::debug!("Reducing learning rate to {:e}", reduced);
            return reduced;
        }
        learning_rate
    }
}

/// Run `task` with the backend generator seeded, excluding other seeded runs
pub fn with_seed<T>(seed: u64, task: impl FnOnce() -> T) -> T {
    let _guard = BACKEND_RNG
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    TrainingBackend::seed(seed);
    task()
}

fn select_rows(data: &Dataset, indices: &[usize]) -> (Array2<f64>, Vec<f64>) {
    (
        data.windows.select(Axis(0), indices),
        indices.iter().map(|&i| data.targets[i]).collect(),
    )
}

/// Mean squared error of the network on a dataset, without dropout
pub fn evaluate(network: &LstmNetwork<InferenceBackend>, data: &Dataset) -> Result<f64> {
    if data.is_empty() {
        return Ok(f64::NAN);
    }
    let predictions = network.predict(data.windows.view(), &DEVICE)?;
    Ok(predictions
        .iter()
        .zip(&data.targets)
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / data.len() as f64)
}

/// Train `network` with Adam; the weights of the best epoch are returned
pub fn fit(
    network: LstmNetwork<TrainingBackend>,
    train: &Dataset,
    validation: Option<&Dataset>,
    config: &TrainingConfig,
    rng: &mut StdRng,
) -> Result<(LstmNetwork<InferenceBackend>, TrainingHistory)> {
    if train.is_empty() {
        return Err(ForecastError::ValidationError(
            "No training windows available".to_string(),
        ));
    }

    let mut network = network;
    let mut optimizer = AdamConfig::new()
        .with_epsilon(1e-7)
        .init::<TrainingBackend, LstmNetwork<TrainingBackend>>();
    let mut early_stopping = EarlyStopping::new(config.early_stopping_patience);
    let mut plateau = ReduceLrOnPlateau::new(config);
    let mut learning_rate = config.learning_rate;
    let mut history = TrainingHistory::default();
    let mut order: Vec<usize> = (0..train.len()).collect();

    for epoch in 0..config.epochs {
        order.shuffle(rng);
        let mut loss_sum = 0.0;
        let mut mae_sum = 0.0;

        for batch in order.chunks(config.batch_size) {
            let (windows, targets) = select_rows(train, batch);
            let predictions = network.forward(windows_tensor(windows.view(), &DEVICE));
            let errors = predictions - targets_tensor(&targets, &DEVICE);
            let mae: f64 = errors.clone().abs().mean().into_scalar().elem();
            let loss = (errors.clone() * errors).mean();
            let loss_value: f64 = loss.clone().into_scalar().elem();
            if !loss_value.is_finite() {
                return Err(ForecastError::ModelError(format!(
                    "Training loss diverged at epoch {}",
                    epoch + 1
                )));
            }
            loss_sum += loss_value * batch.len() as f64;
            mae_sum += mae * batch.len() as f64;

            let gradients = GradientsParams::from_grads(loss.backward(), &network);
            network = optimizer.step(learning_rate, network, gradients);
        }

        let loss = loss_sum / train.len() as f64;
        history.loss.push(loss);
        history.mae.push(mae_sum / train.len() as f64);
        history.learning_rates.push(learning_rate);

        let snapshot = network.valid();
        let monitored = match validation.filter(|v| !v.is_empty()) {
            Some(validation) => {
                let val_loss = evaluate(&snapshot, validation)?;
                history.val_loss.push(val_loss);
                val_loss
            }
            None => loss,
        };
        log::debug!(
            "Epoch {}/{}: loss={:.6} monitored={:.6} lr={:e}",
            epoch + 1,
            config.epochs,
            loss,
            monitored,
            learning_rate
        );

        if early_stopping.update(epoch, monitored, || snapshot) {
            history.stopped_early = true;
            log::info!("Early stopping after epoch {}", epoch + 1);
            break;
        }
        learning_rate = plateau.update(monitored, learning_rate);
    }

    history.best_epoch = early_stopping.best_epoch;
    let best = early_stopping
        .best_weights
        .take()
        .unwrap_or_else(|| network.valid());
    Ok((best, history))
}
