//! Derivative-free minimisation of negative log-likelihoods
//!
//! The ARIMA and GARCH likelihoods are minimised with argmin's Nelder–Mead
//! solver. Each model exposes its objective through [`Objective`]; the
//! adapter turns non-finite values into a large finite penalty because the
//! simplex ordering cannot cope with NaN. The solver is restarted from the
//! best vertex until a restart stops improving the cost.

use crate::error::{ForecastError, Result};
use argmin::core::{
    CostFunction, Error, Executor, State, TerminationReason, TerminationStatus,
};
use argmin::solver::neldermead::NelderMead;

/// Cost assigned to parameters outside the admissible region
pub const PENALTY: f64 = 1.0e12;

/// A cost to minimise over an unconstrained parameter vector
pub trait Objective {
    fn value(&self, params: &[f64]) -> f64;
}

/// Bridges an [`Objective`] to argmin's `CostFunction`
struct ArgMinAdapter<'a, O: Objective> {
    objective: &'a O,
}

impl<'a, O: Objective> CostFunction for ArgMinAdapter<'a, O> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, Error> {
        let value = self.objective.value(params);
        if value.is_finite() {
            Ok(value.min(PENALTY))
        } else {
            Ok(PENALTY)
        }
    }
}

/// Solver settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadOptions {
    /// Iteration cap per run
    pub max_iters: u64,
    /// Stop when the standard deviation of the simplex costs falls below this
    pub sd_tolerance: f64,
    /// Extra runs started from the previous optimum
    pub restarts: usize,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            sd_tolerance: 1e-9,
            restarts: 2,
        }
    }
}

/// Result of a minimisation
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub params: Vec<f64>,
    pub cost: f64,
    /// Iterations summed over all runs
    pub iterations: u64,
    /// Whether the last run met the tolerance before the iteration cap
    pub converged: bool,
}

/// Initial simplex: `start` plus one vertex per coordinate offset by `steps[i]`
fn build_simplex(start: &[f64], steps: &[f64]) -> Vec<Vec<f64>> {
    let mut simplex = Vec::with_capacity(start.len() + 1);
    simplex.push(start.to_vec());
    for (i, step) in steps.iter().enumerate() {
        let mut vertex = start.to_vec();
        vertex[i] += step;
        simplex.push(vertex);
    }
    simplex
}

/// Minimise `objective` from `start` with initial simplex offsets `steps`
pub fn minimize<O: Objective>(
    objective: &O,
    start: Vec<f64>,
    steps: &[f64],
    options: &NelderMeadOptions,
) -> Result<OptimOutcome> {
    if start.is_empty() {
        return Err(ForecastError::OptimizationError(
            "Cannot minimise over an empty parameter vector".to_string(),
        ));
    }
    if steps.len() != start.len() || steps.iter().any(|s| *s == 0.0 || !s.is_finite()) {
        return Err(ForecastError::OptimizationError(format!(
            "Expected {} non-zero finite simplex steps, got {:?}",
            start.len(),
            steps
        )));
    }

    let adapter = ArgMinAdapter { objective };
    let mut best_params = start;
    let mut best_cost = adapter.cost(&best_params)?;
    let mut iterations = 0;
    let mut converged = false;

    for run in 0..=options.restarts {
        let solver = NelderMead::new(build_simplex(&best_params, steps))
            .with_sd_tolerance(options.sd_tolerance)?;
        let result = Executor::new(ArgMinAdapter { objective }, solver)
            .configure(|state| state.max_iters(options.max_iters))
            .run()?;

        let state = result.state();
        iterations += state.get_iter();
        converged = matches!(
            state.get_termination_status(),
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
        );
        let cost = state.get_best_cost();
        let params = state.get_best_param().cloned().ok_or_else(|| {
            ForecastError::OptimizationError("Solver returned no parameters".to_string())
        })?;

        let improvement = best_cost - cost;
        if cost < best_cost {
            best_params = params;
            best_cost = cost;
        }
        log::debug!(
            "Nelder-Mead run {} finished at cost {:.6} after {} iterations",
            run,
            cost,
            state.get_iter()
        );
        if improvement <= options.sd_tolerance.max(1e-10) * best_cost.abs().max(1.0) {
            break;
        }
    }

    if best_cost >= PENALTY {
        return Err(ForecastError::OptimizationError(
            "No admissible parameters found".to_string(),
        ));
    }

    Ok(OptimOutcome {
        params: best_params,
        cost: best_cost,
        iterations,
        converged,
    })
}
