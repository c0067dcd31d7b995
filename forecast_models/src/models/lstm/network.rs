//! Stacked LSTM regressor on burn
//!
//! Layout: LSTM(units) → Dropout → LSTM(units/2) → Dropout → LSTM(units/4)
//! → Dropout → Dense(25) → Dense(1). Windows enter as `(batch, lookback, 1)`
//! tensors and only the last hidden state of the third layer reaches the
//! dense head.

use crate::error::{ForecastError, Result};
use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Lstm, LstmConfig};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use ndarray::ArrayView2;

/// Backend used for forecasting and validation
pub type InferenceBackend = NdArray<f32>;

/// Backend used while fitting; dropout is only active here
pub type TrainingBackend = Autodiff<InferenceBackend>;

/// Width of the hidden dense layer
pub const DENSE_UNITS: usize = 25;

/// Device every tensor lives on
pub const DEVICE: NdArrayDevice = NdArrayDevice::Cpu;

#[derive(Module, Debug)]
pub struct LstmNetwork<B: Backend> {
    first: Lstm<B>,
    second: Lstm<B>,
    third: Lstm<B>,
    dropout: Dropout,
    hidden_dense: Linear<B>,
    output: Linear<B>,
}

impl<B: Backend> LstmNetwork<B> {
    /// Build a network whose recurrent widths halve from `units`
    pub fn new(units: usize, dropout: f64, device: &B::Device) -> Self {
        let widths = [units, units / 2, units / 4];
        Self {
            first: LstmConfig::new(1, widths[0], true).init(device),
            second: LstmConfig::new(widths[0], widths[1], true).init(device),
            third: LstmConfig::new(widths[1], widths[2], true).init(device),
            dropout: DropoutConfig::new(dropout).init(),
            hidden_dense: LinearConfig::new(widths[2], DENSE_UNITS).init(device),
            output: LinearConfig::new(DENSE_UNITS, 1).init(device),
        }
    }

    /// `(batch, lookback, 1)` windows to `(batch, 1)` predictions
    pub fn forward(&self, windows: Tensor<B, 3>) -> Tensor<B, 2> {
        let (x, _) = self.first.forward(windows, None);
        let x = self.dropout.forward(x);
        let (x, _) = self.second.forward(x, None);
        let x = self.dropout.forward(x);
        let (x, _) = self.third.forward(x, None);
        let x = self.dropout.forward(x);

        let [batch, steps, hidden] = x.dims();
        let last = x
            .slice([0..batch, steps - 1..steps, 0..hidden])
            .reshape([batch, hidden]);
        self.output.forward(self.hidden_dense.forward(last))
    }

    /// One prediction per window row
    pub fn predict(&self, windows: ArrayView2<'_, f64>, device: &B::Device) -> Result<Vec<f64>> {
        let predictions = self.forward(windows_tensor(windows, device));
        to_f64(predictions.into_data())
    }
}

/// Rows of `windows` as a `(batch, lookback, 1)` tensor
pub fn windows_tensor<B: Backend>(windows: ArrayView2<'_, f64>, device: &B::Device) -> Tensor<B, 3> {
    let (batch, lookback) = windows.dim();
    let values: Vec<f32> = windows.iter().map(|&v| v as f32).collect();
    Tensor::from_data(TensorData::new(values, [batch, lookback, 1]), device)
}

/// Targets as a `(batch, 1)` tensor
pub fn targets_tensor<B: Backend>(targets: &[f64], device: &B::Device) -> Tensor<B, 2> {
    let values: Vec<f32> = targets.iter().map(|&v| v as f32).collect();
    Tensor::from_data(TensorData::new(values, [targets.len(), 1]), device)
}

pub fn to_f64(data: TensorData) -> Result<Vec<f64>> {
    data.to_vec::<f32>()
        .map(|values| values.into_iter().map(f64::from).collect())
        .map_err(|e| ForecastError::ModelError(format!("Unreadable tensor data: {:?}", e)))
}
