//! GARCH model for volatility forecasting
//!
//! Percentage log returns are modelled with a constant mean and the
//! conditional variance recursion
//!
//! `σ²_t = ω + Σ α_i ε²_{t−i} + Σ β_j σ²_{t−j}`
//!
//! where `p` counts the ARCH terms (α) and `q` the GARCH terms (β).
//! Pre-sample variances are backcast with exponentially decaying weights and
//! the likelihood is maximised with Nelder–Mead under the constraints
//! `ω > 0`, `α, β ≥ 0` and `Σα + Σβ ≤ 1`.

use super::{ForecastModel, ForecastResult, TrainedForecastModel};
use crate::data::{Distribution, GarchParams};
use crate::error::{ForecastError, Result};
use crate::optimization::{minimize, NelderMeadOptions, Objective, PENALTY};
use crate::volatility::percentage_log_returns;
use forecast_math::{mean, variance};
use statrs::function::gamma::ln_gamma;
use std::f64::consts::PI;

/// Fewest prices the GARCH predictor accepts
pub const GARCH_MIN_OBSERVATIONS: usize = 100;
/// Largest ARCH or GARCH order accepted
pub const MAX_GARCH_ORDER: usize = 5;

const BACKCAST_DECAY: f64 = 0.94;
const BACKCAST_WINDOW: usize = 75;
const NU_MIN: f64 = 2.05;
const NU_MAX: f64 = 500.0;
const NU_START: f64 = 8.0;
const LAMBDA_MAX: f64 = 0.995;
const MIN_VARIANCE: f64 = 1e-12;

/// Fitted or candidate GARCH parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GarchParameters {
    pub mu: f64,
    pub omega: f64,
    pub alpha: Vec<f64>,
    pub beta: Vec<f64>,
    /// Degrees of freedom (Student-t and skew-t)
    pub nu: Option<f64>,
    /// Asymmetry (skew-t)
    pub lambda: Option<f64>,
}

impl GarchParameters {
    /// `Σα + Σβ`
    pub fn persistence(&self) -> f64 {
        self.alpha.iter().sum::<f64>() + self.beta.iter().sum::<f64>()
    }

    /// Unconditional variance `ω / (1 − Σα − Σβ)`, defined only when persistence < 1
    pub fn long_run_variance(&self) -> Option<f64> {
        let persistence = self.persistence();
        if !(persistence < 1.0) {
            return None;
        }
        let variance = self.omega / (1.0 - persistence);
        (variance.is_finite() && variance > 0.0).then_some(variance)
    }

    pub fn long_run_volatility(&self) -> Option<f64> {
        self.long_run_variance().map(f64::sqrt)
    }

    fn is_admissible(&self) -> bool {
        let finite = self.mu.is_finite()
            && self.omega.is_finite()
            && self.alpha.iter().chain(&self.beta).all(|v| v.is_finite());
        let nu_ok = self.nu.map_or(true, |nu| (NU_MIN..=NU_MAX).contains(&nu));
        let lambda_ok = self.lambda.map_or(true, |l| l.abs() < LAMBDA_MAX);
        finite
            && self.omega > 0.0
            && self.alpha.iter().chain(&self.beta).all(|v| *v >= 0.0)
            && self.persistence() <= 1.0
            && nu_ok
            && lambda_ok
    }
}

/// Untrained GARCH configuration
#[derive(Debug, Clone)]
pub struct GarchModel {
    p: usize,
    q: usize,
    dist: Distribution,
    options: NelderMeadOptions,
}

impl GarchModel {
    /// Create a GARCH model with `p` ARCH and `q` GARCH terms
    pub fn new(p: usize, q: usize, dist: Distribution) -> Result<Self> {
        if p == 0 || p > MAX_GARCH_ORDER {
            return Err(ForecastError::InvalidParameter(format!(
                "ARCH order p must be between 1 and {}, got {}",
                MAX_GARCH_ORDER, p
            )));
        }
        if q > MAX_GARCH_ORDER {
            return Err(ForecastError::InvalidParameter(format!(
                "GARCH order q must be at most {}, got {}",
                MAX_GARCH_ORDER, q
            )));
        }
        Ok(Self {
            p,
            q,
            dist,
            options: NelderMeadOptions {
                max_iters: 5000,
                ..NelderMeadOptions::default()
            },
        })
    }

    pub fn from_params(params: &GarchParams) -> Result<Self> {
        Self::new(params.p, params.q, params.dist)
    }

    pub fn with_options(mut self, options: NelderMeadOptions) -> Self {
        self.options = options;
        self
    }

    /// Number of free parameters including the mean
    fn n_params(&self) -> usize {
        2 + self.p
            + self.q
            + match self.dist {
                Distribution::Normal => 0,
                Distribution::T => 1,
                Distribution::SkewT => 2,
            }
    }

    /// Fit directly to a percentage return series
    pub fn fit_returns(&self, returns: &[f64]) -> Result<TrainedGarch> {
        if returns.len() <= self.n_params() + 1 {
            return Err(ForecastError::ModelError(format!(
                "GARCH({},{}) needs more than {} returns, got {}",
                self.p,
                self.q,
                self.n_params() + 1,
                returns.len()
            )));
        }
        let sample_mean = mean(returns)?;
        let sample_variance = variance(returns)?;
        if sample_variance <= MIN_VARIANCE {
            return Err(ForecastError::ModelError(
                "Returns have zero variance; volatility cannot be estimated".to_string(),
            ));
        }

        let objective = GarchObjective {
            returns,
            p: self.p,
            q: self.q,
            dist: self.dist,
        };
        let (start, steps) = self.starting_values(sample_mean, sample_variance);
        let outcome = minimize(&objective, start, &steps, &self.options)?;
        if !outcome.converged {
            log::warn!(
                "GARCH({},{}) likelihood did not converge within the iteration cap",
                self.p,
                self.q
            );
        }

        let params = objective.unpack(&outcome.params);
        let residuals: Vec<f64> = returns.iter().map(|r| r - params.mu).collect();
        let backcast = backcast(&residuals);
        let variances = conditional_variances(&params, &residuals, backcast);
        let log_likelihood = log_likelihood(&params, self.dist, &residuals, &variances);
        if !log_likelihood.is_finite() {
            return Err(ForecastError::ModelError(
                "GARCH likelihood is not finite at the optimum".to_string(),
            ));
        }

        Ok(TrainedGarch {
            p: self.p,
            q: self.q,
            dist: self.dist,
            n_params: self.n_params(),
            params,
            log_likelihood,
            residuals,
            variances,
            backcast,
            converged: outcome.converged,
        })
    }

    fn starting_values(&self, sample_mean: f64, sample_variance: f64) -> (Vec<f64>, Vec<f64>) {
        let alpha = 0.1 / self.p as f64;
        let beta = if self.q > 0 { 0.8 / self.q as f64 } else { 0.0 };
        let persistence = alpha * self.p as f64 + beta * self.q as f64;
        let omega = sample_variance * (1.0 - persistence);

        let mut start = vec![sample_mean, omega];
        let mut steps = vec![0.1 * sample_variance.sqrt(), 0.5 * omega];
        start.extend(std::iter::repeat(alpha).take(self.p));
        steps.extend(std::iter::repeat(0.05).take(self.p));
        start.extend(std::iter::repeat(beta).take(self.q));
        steps.extend(std::iter::repeat(-0.05).take(self.q));
        match self.dist {
            Distribution::Normal => {}
            Distribution::T => {
                start.push(NU_START);
                steps.push(2.0);
            }
            Distribution::SkewT => {
                start.extend([NU_START, 0.0]);
                steps.extend([2.0, 0.1]);
            }
        }
        (start, steps)
    }
}

impl ForecastModel for GarchModel {
    type Trained = TrainedGarch;
    const MODEL_TYPE: &'static str = "GARCH";

    fn train(&self, prices: &[f64]) -> Result<Self::Trained> {
        let returns = percentage_log_returns(prices)?;
        self.fit_returns(&returns)
    }

    fn min_observations(&self) -> usize {
        GARCH_MIN_OBSERVATIONS
    }

    fn name(&self) -> String {
        format!("GARCH({},{})", self.p, self.q)
    }
}

/// Exponentially weighted mean of early squared residuals
fn backcast(residuals: &[f64]) -> f64 {
    let window = residuals.len().min(BACKCAST_WINDOW);
    let mut weight = 1.0;
    let mut total_weight = 0.0;
    let mut value = 0.0;
    for r in &residuals[..window] {
        value += weight * r * r;
        total_weight += weight;
        weight *= BACKCAST_DECAY;
    }
    value / total_weight
}

/// Conditional variance path; pre-sample terms take the backcast value
fn conditional_variances(params: &GarchParameters, residuals: &[f64], backcast: f64) -> Vec<f64> {
    let mut variances: Vec<f64> = Vec::with_capacity(residuals.len());
    for t in 0..residuals.len() {
        let mut sigma2 = params.omega;
        for (i, alpha) in params.alpha.iter().enumerate() {
            let shock2 = if t > i {
                residuals[t - i - 1].powi(2)
            } else {
                backcast
            };
            sigma2 += alpha * shock2;
        }
        for (j, beta) in params.beta.iter().enumerate() {
            let lagged = if t > j { variances[t - j - 1] } else { backcast };
            sigma2 += beta * lagged;
        }
        variances.push(sigma2.max(MIN_VARIANCE));
    }
    variances
}

/// Log density of one residual given its conditional variance
fn log_density(dist: Distribution, params: &GarchParameters, residual: f64, sigma2: f64) -> f64 {
    match dist {
        Distribution::Normal => -0.5 * ((2.0 * PI).ln() + sigma2.ln() + residual * residual / sigma2),
        Distribution::T => {
            let nu = params.nu.unwrap_or(NU_START);
            ln_gamma((nu + 1.0) / 2.0)
                - ln_gamma(nu / 2.0)
                - 0.5 * (PI * (nu - 2.0)).ln()
                - 0.5 * sigma2.ln()
                - (nu + 1.0) / 2.0 * (1.0 + residual * residual / (sigma2 * (nu - 2.0))).ln()
        }
        Distribution::SkewT => {
            let nu = params.nu.unwrap_or(NU_START);
            let lambda = params.lambda.unwrap_or(0.0);
            let c = (ln_gamma((nu + 1.0) / 2.0)
                - ln_gamma(nu / 2.0)
                - 0.5 * (PI * (nu - 2.0)).ln())
            .exp();
            let a = 4.0 * lambda * c * (nu - 2.0) / (nu - 1.0);
            let b = (1.0 + 3.0 * lambda * lambda - a * a).sqrt();
            let z = residual / sigma2.sqrt();
            let skew = if z < -a / b { 1.0 - lambda } else { 1.0 + lambda };
            let s = (b * z + a) / skew;
            b.ln() + c.ln() - 0.5 * sigma2.ln() - (nu + 1.0) / 2.0 * (1.0 + s * s / (nu - 2.0)).ln()
        }
    }
}

fn log_likelihood(
    params: &GarchParameters,
    dist: Distribution,
    residuals: &[f64],
    variances: &[f64],
) -> f64 {
    residuals
        .iter()
        .zip(variances)
        .map(|(e, s2)| log_density(dist, params, *e, *s2))
        .sum()
}

/// Negative log-likelihood over `[μ, ω, α..., β..., ν?, λ?]`
struct GarchObjective<'a> {
    returns: &'a [f64],
    p: usize,
    q: usize,
    dist: Distribution,
}

impl<'a> GarchObjective<'a> {
    fn unpack(&self, params: &[f64]) -> GarchParameters {
        let tail = 2 + self.p + self.q;
        let (nu, lambda) = match self.dist {
            Distribution::Normal => (None, None),
            Distribution::T => (Some(params[tail]), None),
            Distribution::SkewT => (Some(params[tail]), Some(params[tail + 1])),
        };
        GarchParameters {
            mu: params[0],
            omega: params[1],
            alpha: params[2..2 + self.p].to_vec(),
            beta: params[2 + self.p..tail].to_vec(),
            nu,
            lambda,
        }
    }
}

impl<'a> Objective for GarchObjective<'a> {
    fn value(&self, params: &[f64]) -> f64 {
        let params = self.unpack(params);
        if !params.is_admissible() {
            return PENALTY;
        }
        let residuals: Vec<f64> = self.returns.iter().map(|r| r - params.mu).collect();
        let backcast = backcast(&residuals);
        let variances = conditional_variances(&params, &residuals, backcast);
        -log_likelihood(&params, self.dist, &residuals, &variances)
    }
}

/// Fitted GARCH model
#[derive(Debug, Clone)]
pub struct TrainedGarch {
    p: usize,
    q: usize,
    dist: Distribution,
    n_params: usize,
    params: GarchParameters,
    log_likelihood: f64,
    residuals: Vec<f64>,
    variances: Vec<f64>,
    backcast: f64,
    converged: bool,
}

impl TrainedGarch {
    pub fn parameters(&self) -> &GarchParameters {
        &self.params
    }

    pub fn distribution(&self) -> Distribution {
        self.dist
    }

    /// Order label, e.g. `GARCH(1,1)`
    pub fn order_label(&self) -> String {
        format!("GARCH({},{})", self.p, self.q)
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood + 2.0 * self.n_params as f64
    }

    pub fn bic(&self) -> f64 {
        -2.0 * self.log_likelihood + self.n_params as f64 * (self.residuals.len() as f64).ln()
    }

    pub fn conditional_variances(&self) -> &[f64] {
        &self.variances
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Multi-step variance forecast; future squared shocks are replaced by
    /// their conditional expectation
    pub fn variance_forecast(&self, horizons: usize) -> Vec<f64> {
        let n = self.residuals.len();
        let mut shocks2: Vec<f64> = self.residuals.iter().map(|e| e * e).collect();
        let mut variances = self.variances.clone();

        for t in n..n + horizons {
            let mut sigma2 = self.params.omega;
            for (i, alpha) in self.params.alpha.iter().enumerate() {
                sigma2 += alpha * if t > i { shocks2[t - i - 1] } else { self.backcast };
            }
            for (j, beta) in self.params.beta.iter().enumerate() {
                sigma2 += beta * if t > j { variances[t - j - 1] } else { self.backcast };
            }
            variances.push(sigma2);
            shocks2.push(sigma2);
        }

        variances.split_off(n)
    }
}

impl TrainedForecastModel for TrainedGarch {
    /// Forecast conditional volatility (standard deviation of percentage returns)
    fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        let volatilities: Vec<f64> = self
            .variance_forecast(horizons)
            .into_iter()
            .map(f64::sqrt)
            .collect();
        if volatilities.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelError(
                "Variance forecast is not finite".to_string(),
            ));
        }
        ForecastResult::new(volatilities, horizons)
    }

    fn name(&self) -> String {
        self.order_label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Predictor;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution as _, Normal};

    fn simulate(n: usize, omega: f64, alpha: f64, beta: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut sigma2 = omega / (1.0 - alpha - beta);
        let mut previous = 0.0;
        (0..n)
            .map(|_| {
                sigma2 = omega + alpha * previous * previous + beta * sigma2;
                previous = sigma2.sqrt() * normal.sample(&mut rng);
                previous
            })
            .collect()
    }

    fn prices_from_returns(returns: &[f64]) -> Vec<f64> {
        let mut price = 100.0;
        let mut prices = vec![price];
        for r in returns {
            price *= (r / 100.0).exp();
            prices.push(price);
        }
        prices
    }

    #[test]
    fn test_long_run_volatility_requires_stationarity() {
        let mut params = GarchParameters {
            mu: 0.0,
            omega: 0.2,
            alpha: vec![0.1],
            beta: vec![0.8],
            nu: None,
            lambda: None,
        };
        assert_abs_diff_eq!(params.long_run_volatility().unwrap(), 2.0f64.sqrt(), epsilon = 1e-12);

        params.beta = vec![0.9];
        assert_eq!(params.long_run_volatility(), None);

        params.beta = vec![0.95];
        assert_eq!(params.long_run_volatility(), None);
    }

    #[test]
    fn test_backcast_weights_recent_observations_less() {
        let residuals = vec![1.0; 100];
        assert_abs_diff_eq!(backcast(&residuals), 1.0, epsilon = 1e-12);
        let short = vec![2.0, 0.0];
        assert_abs_diff_eq!(backcast(&short), 4.0 / 1.94, epsilon = 1e-12);
    }

    #[test]
    fn test_student_t_density_approaches_normal() {
        let mut params = GarchParameters {
            mu: 0.0,
            omega: 0.1,
            alpha: vec![0.1],
            beta: vec![0.8],
            nu: Some(NU_MAX),
            lambda: Some(0.0),
        };
        let normal = log_density(Distribution::Normal, &params, 0.7, 1.3);
        let student = log_density(Distribution::T, &params, 0.7, 1.3);
        let skew = log_density(Distribution::SkewT, &params, 0.7, 1.3);
        assert_abs_diff_eq!(normal, student, epsilon = 1e-2);
        assert_abs_diff_eq!(student, skew, epsilon = 1e-9);

        params.lambda = Some(0.5);
        let positive = log_density(Distribution::SkewT, &params, 1.0, 1.0);
        let negative = log_density(Distribution::SkewT, &params, -1.0, 1.0);
        assert!(positive != negative);
    }

    #[test]
    fn test_fit_recovers_persistent_variance() {
        let returns = simulate(1500, 0.05, 0.1, 0.85, 42);
        let trained = GarchModel::new(1, 1, Distribution::Normal)
            .unwrap()
            .fit_returns(&returns)
            .unwrap();
        let params = trained.parameters();
        assert!(params.omega > 0.0);
        assert!(params.alpha[0] > 0.02 && params.alpha[0] < 0.3);
        assert!(params.beta[0] > 0.5 && params.beta[0] < 0.99);
        assert!(params.persistence() <= 1.0);
        assert!(trained.bic() > trained.aic());
    }

    #[test]
    fn test_variance_forecast_reverts_to_long_run_level() {
        let returns = simulate(800, 0.1, 0.1, 0.8, 7);
        let trained = GarchModel::new(1, 1, Distribution::Normal)
            .unwrap()
            .fit_returns(&returns)
            .unwrap();
        let forecast = trained.variance_forecast(500);
        if let Some(long_run) = trained.parameters().long_run_variance() {
            assert_abs_diff_eq!(forecast[499], long_run, epsilon = 1e-3 * long_run.max(1.0));
        }
        assert!(forecast.iter().all(|v| *v > 0.0));
    }

    #[test]
    fn test_student_t_fit_reports_degrees_of_freedom() {
        let returns = simulate(600, 0.05, 0.1, 0.85, 3);
        let mut predictor = Predictor::new(GarchModel::new(1, 1, Distribution::T).unwrap());
        predictor.fit(&prices_from_returns(&returns)).unwrap();
        let trained = predictor.trained().unwrap();
        let nu = trained.parameters().nu.unwrap();
        assert!((NU_MIN..=NU_MAX).contains(&nu));
        assert_eq!(trained.parameters().lambda, None);
        assert_eq!(predictor.forecast(5).unwrap().values().len(), 5);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let prices = prices_from_returns(&simulate(300, 0.05, 0.1, 0.85, 9));
        let model = GarchModel::new(1, 1, Distribution::SkewT).unwrap();
        let first = model.train(&prices).unwrap();
        let second = model.train(&prices).unwrap();
        assert_eq!(first.parameters(), second.parameters());
        assert_eq!(first.log_likelihood(), second.log_likelihood());
    }

    #[test]
    fn test_input_validation() {
        assert!(GarchModel::new(0, 1, Distribution::Normal).is_err());
        assert!(GarchModel::new(1, 6, Distribution::Normal).is_err());

        let mut predictor = Predictor::new(GarchModel::new(1, 1, Distribution::Normal).unwrap());
        let short = prices_from_returns(&simulate(98, 0.05, 0.1, 0.85, 1));
        assert_eq!(short.len(), 99);
        assert!(matches!(
            predictor.fit(&short),
            Err(ForecastError::InsufficientData { required: 100, actual: 99, .. })
        ));

        let mut prices = prices_from_returns(&simulate(120, 0.05, 0.1, 0.85, 1));
        prices[10] = -1.0;
        assert!(matches!(
            predictor.fit(&prices),
            Err(ForecastError::ValidationError(_))
        ));

        assert!(matches!(
            predictor.fit(&[50.0; 120]),
            Err(ForecastError::ModelError(_))
        ));
    }
}
