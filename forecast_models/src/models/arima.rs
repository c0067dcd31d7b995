//! ARIMA model for price forecasting
//!
//! The series is differenced `d` times and an ARMA(p, q) model, with a mean
//! term when `d = 0`, is fitted to the result by conditional sum of squares:
//! pre-sample values and shocks are set to zero and the concentrated Gaussian
//! likelihood is minimised with Nelder–Mead. The AR and MA blocks are
//! optimised over partial autocorrelations mapped into (-1, 1), which keeps
//! every candidate stationary and invertible.
//!
//! When no order is given, `d` is chosen by repeated KPSS tests and `(p, q)`
//! by a stepwise AIC search in the style of Hyndman and Khandakar.

use super::{ForecastModel, ForecastResult, TrainedForecastModel};
use crate::data::ArimaParams;
use crate::error::{ForecastError, Result};
use crate::optimization::{minimize, NelderMeadOptions, Objective};
use forecast_math::stationarity::STATIONARITY_ALPHA;
use forecast_math::{
    adf_test, difference, excess_kurtosis, is_constant, kpss_test, ljung_box, mean, skewness,
    std_dev, AdfResult,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;

/// Fewest prices the ARIMA predictor accepts
pub const ARIMA_MIN_OBSERVATIONS: usize = 30;
/// Largest AR or MA order considered
pub const MAX_ARMA_ORDER: usize = 5;
/// Largest differencing order considered
pub const MAX_DIFF_ORDER: usize = 2;
/// Upper bound on candidate fits in one stepwise search
const MAX_STEPWISE_FITS: usize = 100;

/// ARIMA order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    /// Create an order, checking each term against the supported range
    pub fn new(p: usize, d: usize, q: usize) -> Result<Self> {
        if p > MAX_ARMA_ORDER || q > MAX_ARMA_ORDER {
            return Err(ForecastError::InvalidParameter(format!(
                "AR and MA orders must be at most {}, got p={} q={}",
                MAX_ARMA_ORDER, p, q
            )));
        }
        if d > MAX_DIFF_ORDER {
            return Err(ForecastError::InvalidParameter(format!(
                "Differencing order must be at most {}, got {}",
                MAX_DIFF_ORDER, d
            )));
        }
        Ok(Self { p, d, q })
    }

    pub fn as_array(&self) -> [usize; 3] {
        [self.p, self.d, self.q]
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum OrderChoice {
    Fixed(ArimaOrder),
    Auto,
}

/// Untrained ARIMA configuration
#[derive(Debug, Clone)]
pub struct ArimaModel {
    choice: OrderChoice,
    options: NelderMeadOptions,
}

impl ArimaModel {
    /// ARIMA with a fixed order
    pub fn new(p: usize, d: usize, q: usize) -> Result<Self> {
        Ok(Self {
            choice: OrderChoice::Fixed(ArimaOrder::new(p, d, q)?),
            options: NelderMeadOptions::default(),
        })
    }

    /// ARIMA whose order is searched during training
    pub fn auto() -> Self {
        Self {
            choice: OrderChoice::Auto,
            options: NelderMeadOptions::default(),
        }
    }

    /// Build from request parameters; any missing term enables the search
    pub fn from_params(params: &ArimaParams) -> Result<Self> {
        match params.fixed_order() {
            Some((p, d, q)) => Self::new(p, d, q),
            None => Ok(Self::auto()),
        }
    }

    pub fn with_options(mut self, options: NelderMeadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn is_auto(&self) -> bool {
        self.choice == OrderChoice::Auto
    }
}

impl ForecastModel for ArimaModel {
    type Trained = TrainedArima;
    const MODEL_TYPE: &'static str = "ARIMA";

    fn train(&self, prices: &[f64]) -> Result<Self::Trained> {
        let stationarity = match adf_test(prices, None) {
            Ok(result) => Some(result),
            Err(e) => {
                log::warn!("ADF test skipped: {}", e);
                None
            }
        };

        let mut trained = match self.choice {
            OrderChoice::Fixed(order) => fit_order(prices, order, &self.options)?,
            OrderChoice::Auto => {
                let d = select_differencing(prices);
                let search = StepwiseSearch::new(prices, d, &self.options).run()?;
                log::info!(
                    "Stepwise search selected {} after {} fits",
                    search.order,
                    search.candidate_fits
                );
                search
            }
        };

        trained.auto_selected = self.is_auto();
        trained.stationarity = stationarity;
        Ok(trained)
    }

    fn min_observations(&self) -> usize {
        ARIMA_MIN_OBSERVATIONS
    }

    fn name(&self) -> String {
        match self.choice {
            OrderChoice::Fixed(order) => order.to_string(),
            OrderChoice::Auto => "ARIMA(auto)".to_string(),
        }
    }
}

/// Map unconstrained values to the coefficients of a stationary AR polynomial.
///
/// Each value becomes a partial autocorrelation `x / sqrt(1 + x²)`; the
/// Durbin–Levinson recursion turns those into AR coefficients.
fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let mut coefficients: Vec<f64> = Vec::with_capacity(unconstrained.len());
    for x in unconstrained {
        let r = x / (1.0 + x * x).sqrt();
        let previous = coefficients.clone();
        let k = previous.len();
        for j in 0..k {
            coefficients[j] = previous[j] - r * previous[k - 1 - j];
        }
        coefficients.push(r);
    }
    coefficients
}

/// Conditional residuals of an ARMA model with zero pre-sample values
fn css_residuals(series: &[f64], mean: f64, ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let mut residuals = vec![0.0; series.len()];
    for t in 0..series.len() {
        let mut prediction = 0.0;
        for (i, phi) in ar.iter().enumerate() {
            if t > i {
                prediction += phi * (series[t - i - 1] - mean);
            }
        }
        for (j, theta) in ma.iter().enumerate() {
            if t > j {
                prediction += theta * residuals[t - j - 1];
            }
        }
        residuals[t] = series[t] - mean - prediction;
    }
    residuals
}

fn gaussian_log_likelihood(nobs: usize, sigma2: f64) -> f64 {
    let n = nobs as f64;
    -0.5 * n * ((2.0 * PI).ln() + sigma2.ln() + 1.0)
}

/// Concentrated CSS objective over `[mean?, ar..., ma...]`
struct CssObjective<'a> {
    series: &'a [f64],
    p: usize,
    q: usize,
    include_mean: bool,
}

impl<'a> CssObjective<'a> {
    fn unpack(&self, params: &[f64]) -> (f64, Vec<f64>, Vec<f64>) {
        let offset = usize::from(self.include_mean);
        let mean = if self.include_mean { params[0] } else { 0.0 };
        let ar = constrain_stationary(&params[offset..offset + self.p]);
        let ma: Vec<f64> = constrain_stationary(&params[offset + self.p..offset + self.p + self.q])
            .into_iter()
            .map(|c| -c)
            .collect();
        (mean, ar, ma)
    }
}

impl<'a> Objective for CssObjective<'a> {
    fn value(&self, params: &[f64]) -> f64 {
        let (mean, ar, ma) = self.unpack(params);
        let residuals = css_residuals(self.series, mean, &ar, &ma);
        let n = residuals.len() as f64;
        let sigma2 = residuals.iter().map(|e| e * e).sum::<f64>() / n;
        0.5 * n * sigma2.max(f64::MIN_POSITIVE).ln()
    }
}

/// Fit one ARIMA order to the price series
fn fit_order(prices: &[f64], order: ArimaOrder, options: &NelderMeadOptions) -> Result<TrainedArima> {
    let differenced = difference(prices, order.d);
    let include_mean = order.d == 0;
    let n_coefficients = order.p + order.q + usize::from(include_mean);
    if differenced.len() <= n_coefficients + 1 {
        return Err(ForecastError::ModelError(format!(
            "{} needs more than {} observations after differencing, got {}",
            order,
            n_coefficients + 1,
            differenced.len()
        )));
    }

    let sample_mean = mean(&differenced)?;
    let objective = CssObjective {
        series: &differenced,
        p: order.p,
        q: order.q,
        include_mean,
    };

    let (estimate, converged) = if order.p + order.q == 0 {
        let mut params = Vec::new();
        if include_mean {
            params.push(sample_mean);
        }
        (params, true)
    } else {
        let scale = std_dev(&differenced).unwrap_or(0.0);
        let mut start = Vec::with_capacity(n_coefficients);
        let mut steps = Vec::with_capacity(n_coefficients);
        if include_mean {
            start.push(sample_mean);
            steps.push(if scale > 0.0 { 0.1 * scale } else { 0.1 });
        }
        start.extend(std::iter::repeat(0.1).take(order.p + order.q));
        steps.extend(std::iter::repeat(0.3).take(order.p + order.q));

        let outcome = minimize(&objective, start, &steps, options)?;
        if !outcome.converged {
            log::debug!("{} reached the iteration cap before converging", order);
        }
        (outcome.params, outcome.converged)
    };

    let (fitted_mean, ar, ma) = objective.unpack(&estimate);
    let residuals = css_residuals(&differenced, fitted_mean, &ar, &ma);
    let sigma2 = residuals.iter().map(|e| e * e).sum::<f64>() / residuals.len() as f64;
    let log_likelihood = gaussian_log_likelihood(residuals.len(), sigma2.max(f64::MIN_POSITIVE));
    if !log_likelihood.is_finite() {
        return Err(ForecastError::ModelError(format!(
            "{} produced a non-finite likelihood",
            order
        )));
    }

    let tails = (0..order.d)
        .map(|level| {
            difference(prices, level).last().copied().ok_or_else(|| {
                ForecastError::ModelError("Differencing consumed the whole series".to_string())
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(TrainedArima {
        order,
        include_mean,
        mean: fitted_mean,
        ar,
        ma,
        sigma2,
        log_likelihood,
        residuals,
        differenced,
        tails,
        converged,
        auto_selected: false,
        stationarity: None,
        candidate_fits: 1,
    })
}

/// Differencing order from repeated KPSS tests at the 5% level
pub fn select_differencing(prices: &[f64]) -> usize {
    let mut series = prices.to_vec();
    let mut d = 0;
    while d < MAX_DIFF_ORDER && !is_constant(&series) {
        match kpss_test(&series) {
            Ok(result) if result.should_difference(STATIONARITY_ALPHA) => {
                series = difference(&series, 1);
                d += 1;
            }
            Ok(_) => break,
            Err(e) => {
                log::warn!("KPSS test failed at d={}: {}", d, e);
                break;
            }
        }
    }
    d
}

/// Stepwise neighbourhood search over (p, q) for a fixed d
struct StepwiseSearch<'a> {
    prices: &'a [f64],
    d: usize,
    options: &'a NelderMeadOptions,
    visited: BTreeMap<(usize, usize), Option<f64>>,
    best: Option<TrainedArima>,
}

impl<'a> StepwiseSearch<'a> {
    fn new(prices: &'a [f64], d: usize, options: &'a NelderMeadOptions) -> Self {
        Self {
            prices,
            d,
            options,
            visited: BTreeMap::new(),
            best: None,
        }
    }

    /// Fit (p, d, q) once; returns true when it became the best model
    fn consider(&mut self, p: usize, q: usize) -> bool {
        if p > MAX_ARMA_ORDER || q > MAX_ARMA_ORDER || self.visited.contains_key(&(p, q)) {
            return false;
        }
        let fitted = ArimaOrder::new(p, self.d, q)
            .and_then(|order| fit_order(self.prices, order, self.options));
        match fitted {
            Ok(candidate) => {
                let aic = candidate.aic();
                log::debug!("{} AIC={:.3}", candidate.order, aic);
                self.visited.insert((p, q), Some(aic));
                let improves = self.best.as_ref().map_or(true, |best| aic < best.aic());
                if improves {
                    self.best = Some(candidate);
                }
                improves
            }
            Err(e) => {
                log::debug!("ARIMA({},{},{}) skipped: {}", p, self.d, q, e);
                self.visited.insert((p, q), None);
                false
            }
        }
    }

    fn run(mut self) -> Result<TrainedArima> {
        for (p, q) in [(2, 2), (0, 0), (1, 0), (0, 1)] {
            self.consider(p, q);
        }

        let steps: [(isize, isize); 8] = [
            (-1, 0),
            (1, 0),
            (0, -1),
            (0, 1),
            (-1, -1),
            (1, 1),
            (-1, 1),
            (1, -1),
        ];
        'search: while self.visited.len() < MAX_STEPWISE_FITS {
            let current = match &self.best {
                Some(best) => best.order,
                None => break,
            };
            for (dp, dq) in steps {
                let p = current.p as isize + dp;
                let q = current.q as isize + dq;
                if p < 0 || q < 0 {
                    continue;
                }
                if self.consider(p as usize, q as usize) {
                    continue 'search;
                }
                if self.visited.len() >= MAX_STEPWISE_FITS {
                    break 'search;
                }
            }
            break;
        }

        let fits = self.visited.len();
        let mut best = self.best.ok_or_else(|| {
            ForecastError::ModelError(format!(
                "No ARIMA model with d={} could be fitted",
                self.d
            ))
        })?;
        best.candidate_fits = fits;
        Ok(best)
    }
}

/// Residual summary of a fitted model; undefined moments are `None`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResidualDiagnostics {
    pub residual_mean: Option<f64>,
    pub residual_std: Option<f64>,
    pub residual_skew: Option<f64>,
    pub residual_kurt: Option<f64>,
    pub ljung_box_pvalue: Option<f64>,
}

/// Fitted ARIMA model
#[derive(Debug, Clone)]
pub struct TrainedArima {
    order: ArimaOrder,
    include_mean: bool,
    mean: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    sigma2: f64,
    log_likelihood: f64,
    residuals: Vec<f64>,
    differenced: Vec<f64>,
    /// Last value of the series at each differencing level below `d`
    tails: Vec<f64>,
    converged: bool,
    auto_selected: bool,
    stationarity: Option<AdfResult>,
    candidate_fits: usize,
}

impl TrainedArima {
    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Estimated parameters including the innovation variance
    pub fn n_params(&self) -> usize {
        self.order.p + self.order.q + usize::from(self.include_mean) + 1
    }

    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood + 2.0 * self.n_params() as f64
    }

    pub fn bic(&self) -> f64 {
        -2.0 * self.log_likelihood + self.n_params() as f64 * (self.residuals.len() as f64).ln()
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn auto_selected(&self) -> bool {
        self.auto_selected
    }

    pub fn stationarity(&self) -> Option<&AdfResult> {
        self.stationarity.as_ref()
    }

    /// Number of orders fitted to arrive at this model
    pub fn candidate_fits(&self) -> usize {
        self.candidate_fits
    }

    /// Named parameter values: `const`, `ar.Lk`, `ma.Lk`, `sigma2`
    pub fn params(&self) -> Vec<(String, f64)> {
        let mut params = Vec::with_capacity(self.n_params());
        if self.include_mean {
            params.push(("const".to_string(), self.mean));
        }
        for (k, value) in self.ar.iter().enumerate() {
            params.push((format!("ar.L{}", k + 1), *value));
        }
        for (k, value) in self.ma.iter().enumerate() {
            params.push((format!("ma.L{}", k + 1), *value));
        }
        params.push(("sigma2".to_string(), self.sigma2));
        params
    }

    /// AR coefficients of `φ(L)(1 − L)^d`
    fn integrated_ar(&self) -> Vec<f64> {
        let mut polynomial = Vec::with_capacity(self.ar.len() + self.order.d + 1);
        polynomial.push(1.0);
        polynomial.extend(self.ar.iter().map(|phi| -phi));
        for _ in 0..self.order.d {
            let mut next = vec![0.0; polynomial.len() + 1];
            for (i, c) in polynomial.iter().enumerate() {
                next[i] += c;
                next[i + 1] -= c;
            }
            polynomial = next;
        }
        polynomial[1..].iter().map(|c| -c).collect()
    }

    /// First `horizons` weights of the MA(∞) representation of the price level
    pub fn psi_weights(&self, horizons: usize) -> Vec<f64> {
        let phi = self.integrated_ar();
        let mut psi = Vec::with_capacity(horizons);
        for j in 0..horizons {
            if j == 0 {
                psi.push(1.0);
                continue;
            }
            let mut weight = if j <= self.ma.len() { self.ma[j - 1] } else { 0.0 };
            for i in 1..=j.min(phi.len()) {
                weight += phi[i - 1] * psi[j - i];
            }
            psi.push(weight);
        }
        psi
    }

    /// Moments and Ljung–Box p-value of the residuals
    pub fn residual_diagnostics(&self) -> ResidualDiagnostics {
        let residuals = &self.residuals;
        let lags = (residuals.len() / 5).min(10);
        let ljung_box_pvalue = if lags == 0 {
            None
        } else {
            ljung_box(residuals, lags, 0)
                .map(|test| test.p_value)
                .map_err(|e| log::debug!("Ljung-Box test skipped: {}", e))
                .ok()
        };

        ResidualDiagnostics {
            residual_mean: mean(residuals).ok().filter(|v| v.is_finite()),
            residual_std: std_dev(residuals).ok().filter(|v| v.is_finite()),
            residual_skew: skewness(residuals).ok().filter(|v| v.is_finite()),
            residual_kurt: excess_kurtosis(residuals).ok().filter(|v| v.is_finite()),
            ljung_box_pvalue,
        }
    }
}

impl TrainedForecastModel for TrainedArima {
    fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        let n = self.differenced.len();
        let mut centred: Vec<f64> = self.differenced.iter().map(|w| w - self.mean).collect();
        let mut shocks = self.residuals.clone();

        for _ in 0..horizons {
            let t = centred.len();
            let mut next = 0.0;
            for (i, phi) in self.ar.iter().enumerate() {
                next += phi * centred[t - i - 1];
            }
            for (j, theta) in self.ma.iter().enumerate() {
                next += theta * shocks[t - j - 1];
            }
            centred.push(next);
            shocks.push(0.0);
        }

        let mut path: Vec<f64> = centred[n..].iter().map(|z| z + self.mean).collect();
        for tail in self.tails.iter().rev() {
            let mut level = *tail;
            path = path
                .into_iter()
                .map(|step| {
                    level += step;
                    level
                })
                .collect();
        }

        let psi = self.psi_weights(horizons);
        let mut cumulative = 0.0;
        let std_errors: Vec<f64> = psi
            .iter()
            .map(|weight| {
                cumulative += weight * weight;
                (self.sigma2 * cumulative).sqrt()
            })
            .collect();

        if path.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelError(format!(
                "{} produced a non-finite forecast",
                self.order
            )));
        }

        ForecastResult::new_with_std_errors(path, horizons, std_errors)
    }

    fn name(&self) -> String {
        self.order.to_string()
    }
}
