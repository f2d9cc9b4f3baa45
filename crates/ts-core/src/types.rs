//! Common data types for TorusSpec

use serde::{Deserialize, Serialize};

/// A measured quantity with its one-sigma uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueAndError {
    /// Central value.
    pub value: f64,
    /// One-sigma uncertainty.
    pub err: f64,
}

impl ValueAndError {
    /// Create a new value/uncertainty pair.
    pub fn new(value: f64, err: f64) -> Self {
        Self { value, err }
    }

    /// Relative uncertainty `err / value` (infinite for a zero value).
    pub fn relative_err(&self) -> f64 {
        if self.value == 0.0 { f64::INFINITY } else { self.err / self.value }
    }

    /// Ratio `self / other`. The uncertainty equals `|ratio| · product_relative_error`,
    /// written in absolute form so that a zero numerator keeps a finite error.
    pub fn ratio(&self, other: &ValueAndError) -> ValueAndError {
        let value = self.value / other.value;
        let err = (self.err / other.value).hypot(self.value * other.err / other.value.powi(2));
        ValueAndError { value, err }
    }
}

/// Relative error of a product or quotient of independent factors:
/// `sqrt(Σ (err_i / value_i)^2)`.
pub fn product_relative_error(items: &[ValueAndError]) -> f64 {
    items.iter().map(|item| item.relative_err().powi(2)).sum::<f64>().sqrt()
}

/// Fit result containing parameter estimates and uncertainties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    /// Best-fit parameter values
    pub parameters: Vec<f64>,

    /// Parameter uncertainties (sqrt of covariance diagonal)
    pub uncertainties: Vec<f64>,

    /// Covariance matrix (row-major, N×N). `None` if inversion failed.
    pub covariance: Option<Vec<f64>>,

    /// Weighted chi-square at the minimum
    pub objective: f64,

    /// Convergence status
    pub converged: bool,

    /// Number of optimizer iterations
    pub n_iter: usize,

    /// Number of objective evaluations
    pub n_fev: usize,
}

impl FitResult {
    /// Create a new fit result
    pub fn new(
        parameters: Vec<f64>,
        uncertainties: Vec<f64>,
        objective: f64,
        converged: bool,
        n_iter: usize,
        n_fev: usize,
    ) -> Self {
        Self { parameters, uncertainties, covariance: None, objective, converged, n_iter, n_fev }
    }

    /// Attach a row-major covariance matrix.
    pub fn with_covariance(mut self, covariance: Vec<f64>) -> Self {
        self.covariance = Some(covariance);
        self
    }

    /// Get correlation matrix element (i, j). Returns `None` if covariance is unavailable.
    pub fn correlation(&self, i: usize, j: usize) -> Option<f64> {
        let cov = self.covariance.as_ref()?;
        let n = self.parameters.len();
        if i >= n || j >= n {
            return None;
        }
        let sigma_i = self.uncertainties[i];
        let sigma_j = self.uncertainties[j];
        if sigma_i <= 0.0 || sigma_j <= 0.0 {
            return None;
        }
        Some(cov[i * n + j] / (sigma_i * sigma_j))
    }
}
