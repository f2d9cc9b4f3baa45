//! Spectral observables.
//!
//! Every ratio carries the relative-error law of independent factors,
//! `σ_r = |r| · sqrt(Σ (σ_i / v_i)²)`, via [`ValueAndError::ratio`].

use ts_core::{EnergyInterval, Error, Result, ValueAndError};
use ts_inference::AbsorptionEdgeFitter;
use ts_spectrum::{Spectrum, SpectrumCount};

fn windowed_flux<S: Spectrum>(spectrum: &S, interval: &EnergyInterval, what: &str) -> Result<ValueAndError> {
    let window = spectrum.window(interval);
    if window.len() < 2 {
        return Err(Error::Computation(format!(
            "{what} window [{}, {}] holds {} bins, need at least 2",
            interval.left,
            interval.right,
            window.len()
        )));
    }
    Ok(window.integrate())
}

fn checked_ratio(numerator: ValueAndError, denominator: ValueAndError, what: &str) -> Result<ValueAndError> {
    if denominator.value == 0.0 || !denominator.value.is_finite() {
        return Err(Error::Computation(format!("{what}: denominator is {}", denominator.value)));
    }
    Ok(numerator.ratio(&denominator))
}

/// Equivalent width of a line: line flux over the mean continuum in `window` (eV).
pub fn equivalent_width<S: Spectrum>(line: &S, continuum: &S, window: &EnergyInterval) -> Result<ValueAndError> {
    let line_flux = line.integrate();
    let continuum_level = continuum.average(window)?;
    checked_ratio(line_flux, continuum_level, "equivalent width")
}

/// Hardness ratio `flux(high) / flux(low)` of the continuum.
pub fn hardness_ratio<S: Spectrum>(continuum: &S, low: &EnergyInterval, high: &EnergyInterval) -> Result<ValueAndError> {
    let soft = windowed_flux(continuum, low, "soft band")?;
    let hard = windowed_flux(continuum, high, "hard band")?;
    checked_ratio(hard, soft, "hardness ratio")
}

/// Fraction of the line flux below `shoulder_right`, i.e. in the Compton shoulder.
pub fn compton_shoulder<S: Spectrum>(line: &S, shoulder_right: f64) -> Result<ValueAndError> {
    let Some(&first) = line.x().first() else {
        return Err(Error::Computation("line spectrum has no bins".into()));
    };
    let shoulder = windowed_flux(line, &EnergyInterval::new(first, shoulder_right), "Compton shoulder")?;
    checked_ratio(shoulder, line.integrate(), "Compton shoulder")
}

/// Edge depth and fit quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeMeasurement {
    /// `1 − N` with the uncertainty of `N`.
    pub depth: ValueAndError,
    /// Pearson χ².
    pub chi2: f64,
    /// Degrees of freedom.
    pub dof: usize,
    /// χ² survival probability, when defined.
    pub p_value: Option<f64>,
}

/// Fit the absorption edge of a continuum count spectrum.
pub fn edge_depth(continuum: &SpectrumCount, fitter: &AbsorptionEdgeFitter) -> Result<EdgeMeasurement> {
    let fit = fitter.fit(continuum)?;
    Ok(EdgeMeasurement {
        depth: ValueAndError::new(fit.depth(), fit.transmitted_err),
        chi2: fit.chi2,
        dof: fit.dof,
        p_value: fit.p_value,
    })
}
