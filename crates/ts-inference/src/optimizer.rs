//! Box-constrained L-BFGS.
//!
//! `argmin` has no native bounds, so parameters are clamped before every evaluation and
//! gradient components that point out of the feasible box are zeroed at the boundary.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use ts_core::{Error, Result};

/// L-BFGS settings.
#[derive(Debug, Clone, Copy)]
pub struct LbfgsSettings {
    /// Iteration cap.
    pub max_iter: u64,
    /// Gradient-norm tolerance.
    pub grad_tol: f64,
    /// Number of stored correction pairs.
    pub memory: usize,
}

impl Default for LbfgsSettings {
    fn default() -> Self {
        Self { max_iter: 1000, grad_tol: 1e-6, memory: 7 }
    }
}

/// Outcome of a minimisation.
#[derive(Debug, Clone)]
pub struct Minimum {
    /// Best parameters, inside the bounds.
    pub params: Vec<f64>,
    /// Objective at `params`.
    pub value: f64,
    /// Iterations taken.
    pub n_iter: u64,
    /// Objective evaluations.
    pub n_eval: usize,
    /// Gradient evaluations.
    pub n_grad: usize,
    /// Whether the solver met its tolerance.
    pub converged: bool,
    /// Solver termination status.
    pub status: String,
}

impl fmt::Display for Minimum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "minimum {:.6} after {} iterations ({} evals, {} gradients): {}",
            self.value, self.n_iter, self.n_eval, self.n_grad, self.status
        )
    }
}

/// A scalar function to minimise.
pub trait Objective: Send + Sync {
    /// Objective value.
    fn value(&self, params: &[f64]) -> Result<f64>;

    /// Gradient; central differences unless overridden.
    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        let mut probe = params.to_vec();
        let mut grad = Vec::with_capacity(params.len());
        for i in 0..params.len() {
            let h = 1e-7 * params[i].abs().max(1.0);
            probe[i] = params[i] + h;
            let up = self.value(&probe)?;
            probe[i] = params[i] - h;
            let down = self.value(&probe)?;
            probe[i] = params[i];
            grad.push((up - down) / (2.0 * h));
        }
        Ok(grad)
    }
}

fn clamp_into(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params.iter().zip(bounds).map(|(&v, &(lo, hi))| v.clamp(lo, hi)).collect()
}

#[derive(Default)]
struct Counters {
    eval: AtomicUsize,
    grad: AtomicUsize,
}

struct BoxedProblem<'a> {
    objective: &'a dyn Objective,
    bounds: &'a [(f64, f64)],
    counters: Arc<Counters>,
}

impl CostFunction for BoxedProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Vec<f64>) -> std::result::Result<f64, argmin::core::Error> {
        self.counters.eval.fetch_add(1, Ordering::Relaxed);
        self.objective
            .value(&clamp_into(params, self.bounds))
            .map_err(|e| argmin::core::Error::msg(e.to_string()))
    }
}

impl Gradient for BoxedProblem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, params: &Vec<f64>) -> std::result::Result<Vec<f64>, argmin::core::Error> {
        self.counters.grad.fetch_add(1, Ordering::Relaxed);
        let x = clamp_into(params, self.bounds);
        let mut g = self.objective.gradient(&x).map_err(|e| argmin::core::Error::msg(e.to_string()))?;
        // Project: no descent direction may leave the box.
        for ((gi, &xi), &(lo, hi)) in g.iter_mut().zip(&x).zip(self.bounds) {
            if (xi <= lo && *gi > 0.0) || (xi >= hi && *gi < 0.0) {
                *gi = 0.0;
            }
        }
        Ok(g)
    }
}

/// L-BFGS with More–Thuente line search and box constraints.
#[derive(Debug, Clone, Default)]
pub struct BoundedLbfgs {
    settings: LbfgsSettings,
}

impl BoundedLbfgs {
    /// Optimiser with the given settings.
    pub fn new(settings: LbfgsSettings) -> Self {
        Self { settings }
    }

    /// Minimise `objective` from `start` within `bounds` (one `(lo, hi)` per parameter;
    /// infinite bounds are allowed).
    pub fn minimize(&self, objective: &dyn Objective, start: &[f64], bounds: &[(f64, f64)]) -> Result<Minimum> {
        if start.len() != bounds.len() {
            return Err(Error::Validation(format!(
                "{} start values for {} bounds",
                start.len(),
                bounds.len()
            )));
        }
        if bounds.iter().any(|&(lo, hi)| lo.is_nan() || hi.is_nan() || lo > hi) {
            return Err(Error::Validation("parameter bounds must satisfy lo <= hi".into()));
        }

        let counters = Arc::new(Counters::default());
        let problem = BoxedProblem { objective, bounds, counters: Arc::clone(&counters) };
        let cost_tol = (0.1 * self.settings.grad_tol).max(1e-14);
        let solver = LBFGS::new(MoreThuenteLineSearch::new(), self.settings.memory)
            .with_tolerance_grad(self.settings.grad_tol)
            .and_then(|s| s.with_tolerance_cost(cost_tol))
            .map_err(|e| Error::Validation(format!("invalid L-BFGS tolerance: {e}")))?;

        let start = clamp_into(start, bounds);
        let res = Executor::new(problem, solver)
            .configure(|state| state.param(start).max_iters(self.settings.max_iter))
            .run()
            .map_err(|e| Error::FitFailure(format!("L-BFGS aborted: {e}")))?;

        let state = res.state();
        let best = state
            .get_best_param()
            .ok_or_else(|| Error::FitFailure("L-BFGS produced no parameters".into()))?;
        let status = state.get_termination_status();
        Ok(Minimum {
            params: clamp_into(best, bounds),
            value: state.get_best_cost(),
            n_iter: state.get_iter(),
            n_eval: counters.eval.load(Ordering::Relaxed),
            n_grad: counters.grad.load(Ordering::Relaxed),
            converged: matches!(
                status,
                TerminationStatus::Terminated(TerminationReason::SolverConverged | TerminationReason::TargetCostReached)
            ),
            status: status.to_string(),
        })
    }
}
