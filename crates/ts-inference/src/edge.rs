//! Photoelectric absorption-edge fit.
//!
//! The continuum around an edge is modelled piecewise:
//!
//! ```text
//! left   [left_left,  left_right]   f(E) = m·E + b
//! centre (left_right, right_left)   f(E) = 0          (observations zeroed)
//! right  [right_left, right_right]  f(E) = N·(m·E + b),   N ∈ [0, 1]
//! ```
//!
//! `N` is the fraction of the continuum transmitted across the edge. The fit minimises
//! the weighted χ² with `σ = y_err`; the covariance is `(JᵀWJ)⁻¹` at the optimum.

use nalgebra::{DMatrix, Matrix2, Vector2};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use ts_core::traits::Model;
use ts_core::{EdgeConfig, Error, FitResult, Result};
use ts_spectrum::{Spectrum, SpectrumCount};

use crate::covariance::{Inverse, invert_information};
use crate::optimizer::{BoundedLbfgs, LbfgsSettings, Objective};

/// Energy regions of the edge fit (eV).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeRegions {
    /// Start of the left region.
    pub left_left: f64,
    /// End of the left region.
    pub left_right: f64,
    /// Start of the right region.
    pub right_left: f64,
    /// End of the right region.
    pub right_right: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Left,
    Center,
    Right,
}

impl EdgeRegions {
    /// Regions with `left_left < left_right ≤ right_left < right_right`.
    pub fn new(left_left: f64, left_right: f64, right_left: f64, right_right: f64) -> Result<Self> {
        let all_finite = [left_left, left_right, right_left, right_right].iter().all(|v| v.is_finite());
        if !all_finite || !(left_left < left_right && left_right <= right_left && right_left < right_right) {
            return Err(Error::Validation(format!(
                "edge regions must be increasing, got [{left_left}, {left_right}] [{right_left}, {right_right}]"
            )));
        }
        Ok(Self { left_left, left_right, right_left, right_right })
    }

    /// Regions from configuration; a missing `left_right` is the Compton backscatter
    /// energy of the edge.
    pub fn from_config(cfg: &EdgeConfig) -> Result<Self> {
        let (ll, lr, rl, rr) = cfg.bounds();
        Self::new(ll, lr, rl, rr)
    }

    fn classify(&self, energy: f64) -> Option<Region> {
        if energy < self.left_left || energy > self.right_right {
            None
        } else if energy <= self.left_right {
            Some(Region::Left)
        } else if energy < self.right_left {
            Some(Region::Center)
        } else {
            Some(Region::Right)
        }
    }
}

/// Result of an edge fit.
#[derive(Debug, Clone)]
pub struct EdgeFit {
    /// Continuum slope `m` (per eV).
    pub slope: f64,
    /// Continuum intercept `b`.
    pub intercept: f64,
    /// Transmitted fraction `N`.
    pub transmitted: f64,
    /// One-sigma uncertainty of `N`.
    pub transmitted_err: f64,
    /// Pearson χ² `Σ (obs − exp)²/exp` over the left and right regions.
    pub chi2: f64,
    /// Degrees of freedom, `n_points − 3`.
    pub dof: usize,
    /// χ² survival probability.
    pub p_value: Option<f64>,
    /// Fitted data: left, zeroed centre, right.
    pub observed: SpectrumCount,
    /// Model at the optimum on the same energies.
    pub expected: SpectrumCount,
    /// Optimiser convergence flag.
    pub converged: bool,
    /// Optimiser iterations.
    pub n_iter: u64,
    /// Parameters `(slope, intercept, transmitted)` with covariance; the objective is the
    /// weighted χ².
    pub result: FitResult,
}

impl EdgeFit {
    /// Edge depth `1 − N`.
    pub fn depth(&self) -> f64 {
        1.0 - self.transmitted
    }
}

/// Fits [`EdgeFit`]s on fixed regions.
#[derive(Debug, Clone)]
pub struct AbsorptionEdgeFitter {
    regions: EdgeRegions,
    settings: LbfgsSettings,
}

impl AbsorptionEdgeFitter {
    /// Fitter over `regions` with default optimiser settings.
    pub fn new(regions: EdgeRegions) -> Self {
        Self { regions, settings: LbfgsSettings::default() }
    }

    /// Fitter from the edge configuration block.
    pub fn from_config(cfg: &EdgeConfig) -> Result<Self> {
        let settings = LbfgsSettings { max_iter: cfg.max_iter, ..LbfgsSettings::default() };
        Ok(Self::new(EdgeRegions::from_config(cfg)?).with_settings(settings))
    }

    /// Replace the optimiser settings.
    pub fn with_settings(mut self, settings: LbfgsSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Fit regions.
    pub fn regions(&self) -> &EdgeRegions {
        &self.regions
    }

    /// Fit the edge model to `spectrum`.
    pub fn fit<S: Spectrum>(&self, spectrum: &S) -> Result<EdgeFit> {
        let r = &self.regions;
        let center = 0.5 * (r.left_left + r.right_right);
        let half_span = 0.5 * (r.right_right - r.left_left);

        let mut points = Vec::new();
        let (mut energies, mut observed, mut observed_err) = (Vec::new(), Vec::new(), Vec::new());
        for (x, y, e) in spectrum.iter() {
            let Some(region) = r.classify(x) else { continue };
            energies.push(x);
            if region == Region::Center {
                observed.push(0.0);
                observed_err.push(0.0);
                continue;
            }
            observed.push(y);
            observed_err.push(e);
            // An empty bin has no Poisson error; it is weighted as a single count.
            let sigma = if e.is_finite() && e > 0.0 { e } else { 1.0 };
            points.push(Point { u: (x - center) / half_span, y, w: sigma.powi(-2), right: region == Region::Right });
        }

        let n_left = points.iter().filter(|p| !p.right).count();
        let n_right = points.len() - n_left;
        if n_left < 2 || n_right < 1 {
            return Err(Error::FitFailure(format!(
                "edge fit needs at least 2 left and 1 right points, got {n_left} and {n_right}"
            )));
        }
        let dof = points.len().saturating_sub(3);
        if dof < 1 {
            return Err(Error::FitFailure(format!("edge fit has no degrees of freedom ({} points)", points.len())));
        }

        let chi2 = WeightedChi2 { points };
        let start = chi2.seed();
        let minimum = BoundedLbfgs::new(self.settings).minimize(&chi2, &start, &self.parameter_bounds())?;
        if !minimum.converged {
            return Err(Error::FitFailure(format!("edge fit did not converge: {minimum}")));
        }
        let &[slope_u, intercept_u, transmitted] = minimum.params.as_slice() else {
            return Err(Error::FitFailure("optimiser returned the wrong number of parameters".into()));
        };
        if ![slope_u, intercept_u, transmitted].iter().all(|v| v.is_finite()) {
            return Err(Error::FitFailure("edge fit produced non-finite parameters".into()));
        }

        let inverse = edge_covariance(&chi2.information(&minimum.params))?;

        // Back to physical units: m = m'/s, b = b' − m'·c/s.
        let slope = slope_u / half_span;
        let intercept = intercept_u - slope_u * center / half_span;
        let jac = DMatrix::from_row_slice(
            3,
            3,
            &[1.0 / half_span, 0.0, 0.0, -center / half_span, 1.0, 0.0, 0.0, 0.0, 1.0],
        );
        let covariance = &jac * &inverse.covariance * jac.transpose();
        let errors: Vec<f64> = covariance.diagonal().iter().map(|v| v.sqrt()).collect();
        let transmitted_err = errors[2];

        let expected: Vec<f64> = energies
            .iter()
            .map(|&x| match r.classify(x) {
                Some(Region::Left) => slope * x + intercept,
                Some(Region::Right) => transmitted * (slope * x + intercept),
                _ => 0.0,
            })
            .collect();
        let pearson: f64 = energies
            .iter()
            .zip(observed.iter().zip(&expected))
            .filter(|(x, (_, e))| **e > 0.0 && r.classify(**x) != Some(Region::Center))
            .map(|(_, (o, e))| (o - e).powi(2) / e)
            .sum();
        let p_value = ChiSquared::new(dof as f64).ok().map(|d| d.sf(pearson));

        let expected_err = expected.iter().map(|v| v.max(0.0).sqrt()).collect();
        let result = FitResult::new(
            vec![slope, intercept, transmitted],
            errors,
            minimum.value,
            minimum.converged,
            minimum.n_iter as usize,
            minimum.n_eval,
        )
        .with_covariance(covariance.transpose().as_slice().to_vec());

        log::debug!(
            "edge fit: N = {transmitted:.4} ± {transmitted_err:.4}, chi2 = {pearson:.2} / {dof} ({} iterations)",
            minimum.n_iter
        );

        Ok(EdgeFit {
            slope,
            intercept,
            transmitted,
            transmitted_err,
            chi2: pearson,
            dof,
            p_value,
            observed: SpectrumCount::new(energies.clone(), observed, observed_err)?,
            expected: SpectrumCount::new(energies, expected, expected_err)?,
            converged: minimum.converged,
            n_iter: minimum.n_iter,
            result,
        })
    }
}

/// Invert `JᵀWJ`. A damped inverse is kept, with a warning; no inverse is a fit failure.
fn edge_covariance(information: &DMatrix<f64>) -> Result<Inverse> {
    let inverse = invert_information(information)
        .ok_or_else(|| Error::FitFailure("edge-fit covariance is singular".into()))?;
    if !inverse.is_exact() {
        log::warn!("edge-fit information matrix needed damping {:.3e}; errors are approximate", inverse.damping);
    }
    Ok(inverse)
}

impl Model for AbsorptionEdgeFitter {
    fn parameter_names(&self) -> Vec<String> {
        vec!["slope".into(), "intercept".into(), "transmitted".into()]
    }

    fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        vec![(f64::NEG_INFINITY, f64::INFINITY), (f64::NEG_INFINITY, f64::INFINITY), (0.0, 1.0)]
    }
}

/// One fitted observation on the scaled energy axis `u = (E − c)/s`.
#[derive(Debug, Clone, Copy)]
struct Point {
    u: f64,
    y: f64,
    w: f64,
    right: bool,
}

/// `Σ w (y − f)²` over the left and right points, parameters `(m', b', N)`.
struct WeightedChi2 {
    points: Vec<Point>,
}

impl WeightedChi2 {
    /// Model value and its derivatives with respect to `(m', b', N)`.
    fn eval_point(p: &Point, params: &[f64]) -> (f64, [f64; 3]) {
        let line = params[0] * p.u + params[1];
        if p.right {
            let n = params[2];
            (n * line, [n * p.u, n, line])
        } else {
            (line, [p.u, 1.0, 0.0])
        }
    }

    /// Start point: weighted least squares on the left region for the line, then the
    /// right/left flux ratio for `N`.
    fn seed(&self) -> Vec<f64> {
        let (mut a, mut rhs) = (Matrix2::<f64>::zeros(), Vector2::<f64>::zeros());
        for p in self.points.iter().filter(|p| !p.right) {
            a += Matrix2::new(p.u * p.u, p.u, p.u, 1.0) * p.w;
            rhs += Vector2::new(p.u * p.y, p.y) * p.w;
        }
        let line = a.try_inverse().map(|inv| inv * rhs).unwrap_or_else(|| {
            let left: Vec<f64> = self.points.iter().filter(|p| !p.right).map(|p| p.y).collect();
            Vector2::new(0.0, left.iter().sum::<f64>() / left.len().max(1) as f64)
        });

        let (observed, extrapolated) = self
            .points
            .iter()
            .filter(|p| p.right)
            .fold((0.0, 0.0), |(o, e), p| (o + p.y, e + line[0] * p.u + line[1]));
        let n = if extrapolated > 0.0 { (observed / extrapolated).clamp(0.0, 1.0) } else { 0.5 };
        vec![line[0], line[1], n]
    }

    /// `JᵀWJ` at `params`.
    fn information(&self, params: &[f64]) -> DMatrix<f64> {
        let mut info = DMatrix::<f64>::zeros(3, 3);
        for p in &self.points {
            let (_, d) = Self::eval_point(p, params);
            for i in 0..3 {
                for j in 0..3 {
                    info[(i, j)] += p.w * d[i] * d[j];
                }
            }
        }
        info
    }
}

impl Objective for WeightedChi2 {
    fn value(&self, params: &[f64]) -> Result<f64> {
        Ok(self
            .points
            .iter()
            .map(|p| {
                let (f, _) = Self::eval_point(p, params);
                p.w * (p.y - f).powi(2)
            })
            .sum())
    }

    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        let mut grad = vec![0.0; 3];
        for p in &self.points {
            let (f, d) = Self::eval_point(p, params);
            let r = -2.0 * p.w * (p.y - f);
            for (g, di) in grad.iter_mut().zip(d) {
                *g += r * di;
            }
        }
        Ok(grad)
    }
}
